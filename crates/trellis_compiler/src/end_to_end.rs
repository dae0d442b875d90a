//! Whole-pipeline tests: sources through environment, compiler and catalog.

use crate::{CompileError, Compiler, CompilerConfig, EvalError};
use proptest::prelude::*;
use std::sync::Arc;
use trellis_catalog::{Catalog, CatalogVersion, EdgeKind};
use trellis_core::{ManualClock, Node, ResourceRef, Value};
use trellis_types::{Environment, Environments, MemorySources, ResourceTypeDescriptor};

struct Fixture {
    clock: Arc<ManualClock>,
    sources: Arc<MemorySources>,
    compiler: Compiler,
}

impl Fixture {
    fn new(text: &str) -> Self {
        Self::with_config(text, CompilerConfig::default())
    }

    fn with_config(text: &str, config: CompilerConfig) -> Self {
        let clock = Arc::new(ManualClock::new(1));
        let sources = Arc::new(MemorySources::new(clock.clone()).with_source("site.pp", text));
        let environments =
            Environments::new("production").with(Environment::new("production", sources.clone()));
        let compiler = Compiler::new(environments, config).with_clock(clock.clone());
        Self {
            clock,
            sources,
            compiler,
        }
    }

    fn compile(&self, node: &str) -> Result<Arc<Catalog>, CompileError> {
        self.compiler.compile(&Node::new(node), None)
    }

    fn mark_stale(&self) {
        self.compiler
            .environments()
            .get(None)
            .unwrap()
            .mark_stale();
    }
}

fn compile(text: &str) -> Result<Arc<Catalog>, CompileError> {
    Fixture::new(text).compile("mynode")
}

fn class(name: &str) -> ResourceRef {
    ResourceRef::class(name)
}

// ==================== VERSIONS AND CACHING ====================

#[test]
fn test_version_stable_while_not_stale() {
    let fixture = Fixture::new("class foo { }");
    let first = fixture.compile("mynode").unwrap();
    assert_eq!(first.version(), &CatalogVersion::Timestamp(1));

    fixture.clock.set(2);
    let second = fixture.compile("mynode").unwrap();
    assert_eq!(second.version(), &CatalogVersion::Timestamp(1));
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_version_recomputed_after_forced_stale() {
    let fixture = Fixture::new("class foo { }");
    assert_eq!(fixture.compile("mynode").unwrap().version().as_timestamp(), Some(1));

    fixture.clock.set(2);
    assert_eq!(fixture.compile("mynode").unwrap().version().as_timestamp(), Some(1));

    fixture.mark_stale();
    assert_eq!(fixture.compile("mynode").unwrap().version().as_timestamp(), Some(2));

    fixture.clock.set(3);
    assert_eq!(fixture.compile("mynode").unwrap().version().as_timestamp(), Some(2));
}

#[test]
fn test_reload_within_same_second_gets_newer_version() {
    let fixture = Fixture::new("class foo { }");
    assert_eq!(fixture.compile("mynode").unwrap().version().as_timestamp(), Some(1));

    fixture.mark_stale();
    assert_eq!(fixture.compile("mynode").unwrap().version().as_timestamp(), Some(2));

    fixture.sources.set("site.pp", "class bar { }");
    assert_eq!(fixture.compile("mynode").unwrap().version().as_timestamp(), Some(3));
    assert_eq!(fixture.compile("mynode").unwrap().version().as_timestamp(), Some(3));
}

#[test]
fn test_version_recomputed_after_source_change() {
    let fixture = Fixture::new("notify { 'a': }");
    fixture.compile("mynode").unwrap();

    fixture.clock.set(5);
    fixture.sources.set("site.pp", "notify { 'b': }");
    let catalog = fixture.compile("mynode").unwrap();
    assert_eq!(catalog.version(), &CatalogVersion::Timestamp(5));
    assert!(catalog.resource("Notify[b]").is_some());
    assert!(catalog.resource("Notify[a]").is_none());
}

#[test]
fn test_changed_facts_recompile() {
    let fixture = Fixture::new("notify { $role: }");
    let web = Node::new("mynode").with_fact("role", "web");
    let db = Node::new("mynode").with_fact("role", "db");

    let first = fixture.compiler.compile(&web, None).unwrap();
    let second = fixture.compiler.compile(&db, None).unwrap();
    assert!(first.resource("Notify[web]").is_some());
    assert!(second.resource("Notify[db]").is_some());
}

#[cfg(unix)]
#[test]
fn test_version_from_command() {
    let config = CompilerConfig::default().with_version_command("echo 9fceb02d0ae598e95dc970b74767f19372d61af8");
    let fixture = Fixture::with_config("class foo { }", config);
    let catalog = fixture.compile("mynode").unwrap();
    assert_eq!(
        catalog.version(),
        &CatalogVersion::Command("9fceb02d0ae598e95dc970b74767f19372d61af8".to_string())
    );
}

#[cfg(unix)]
#[test]
fn test_failing_version_command_fails_compile() {
    let config = CompilerConfig::default().with_version_command("exit 1");
    let fixture = Fixture::with_config("class foo { }", config);
    let err = fixture.compile("mynode").unwrap_err();
    assert!(matches!(err.cause, EvalError::VersionCommand { .. }));
}

proptest! {
    #[test]
    fn prop_version_ignores_clock_until_stale(times in proptest::collection::vec(1u64..1_000_000, 1..8)) {
        let fixture = Fixture::new("class foo { } include foo");
        let first = fixture.compile("mynode").unwrap();
        for time in &times {
            fixture.clock.set(*time);
            let again = fixture.compile("mynode").unwrap();
            prop_assert_eq!(again.version(), first.version());
        }

        let last = *times.last().unwrap();
        fixture.clock.set(last + 1_000_000);
        fixture.mark_stale();
        let fresh = fixture.compile("mynode").unwrap();
        prop_assert_eq!(fresh.version(), &CatalogVersion::Timestamp(last + 1_000_000));
        prop_assert_ne!(fresh.version(), first.version());
    }
}

// ==================== CLASS REFERENCE RESOLUTION ====================

const EXPERIMENT: &str = "
    class experiment {
      class baz {
      }
      notify {\"x\" : require => Class[Baz] }
    }
    class baz {
    }
";

fn assert_requires_experiment_baz(catalog: &Catalog) {
    let notify = catalog.resource("Notify[x]").unwrap();
    let required = notify.parameter("require").and_then(Value::as_reference).unwrap();
    assert_eq!(required.title, "Experiment::Baz");
    assert!(catalog.has_edge(
        &class("experiment::baz"),
        &ResourceRef::new("notify", "x"),
        EdgeKind::Before
    ));
}

#[test]
fn test_favor_local_scope_with_included_topscope_class() {
    let text = format!("{EXPERIMENT}\ninclude baz\ninclude experiment\ninclude experiment::baz");
    assert_requires_experiment_baz(&compile(&text).unwrap());
}

#[test]
fn test_favor_local_scope_with_unincluded_topscope_class() {
    let text = format!("{EXPERIMENT}\ninclude experiment\ninclude experiment::baz");
    let catalog = compile(&text).unwrap();
    assert_requires_experiment_baz(&catalog);
    assert!(catalog.resource_by_ref(&class("baz")).is_none());
}

#[test]
fn test_favor_local_scope_regardless_of_include_order() {
    let text = format!("{EXPERIMENT}\ninclude experiment::baz\ninclude baz\ninclude experiment");
    assert_requires_experiment_baz(&compile(&text).unwrap());
}

#[test]
fn test_class_reference_evaluates_local_class() {
    let text = format!("{EXPERIMENT}\ninclude experiment");
    let catalog = compile(&text).unwrap();
    assert_requires_experiment_baz(&catalog);
    assert!(catalog.resource_by_ref(&class("experiment::baz")).is_some());
    assert!(catalog.has_edge(&class("experiment"), &class("experiment::baz"), EdgeKind::Contains));
    assert!(catalog.resource_by_ref(&class("baz")).is_none());
}

#[test]
fn test_class_reference_to_unknown_class_is_unresolved() {
    let err = compile("notify { 'x': require => Class[Missing] }").unwrap_err();
    match err.cause {
        EvalError::UnresolvedReference { reference, .. } => assert_eq!(reference, "Class[Missing]"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_include_skips_inner_define_of_same_name() {
    let catalog = compile(
        "class a {
           define helper { }
           include helper
         }
         class helper { notify { 'h': } }
         include a",
    )
    .unwrap();
    assert!(catalog.resource_by_ref(&class("helper")).is_some());
    assert!(catalog.resource("Notify[h]").is_some());
}

#[test]
fn test_three_level_reference_resolution() {
    let catalog = compile(
        "class a {
           class b {
             class c {
               notify { 'deep': before => Class[Shared] }
             }
           }
           class shared { }
         }
         class shared { }
         include a, a::b, a::b::c, a::shared, shared",
    )
    .unwrap();
    let notify = catalog.resource("Notify[deep]").unwrap();
    let before = notify.parameter("before").and_then(Value::as_reference).unwrap();
    assert_eq!(before, &class("a::shared"));
}

// ==================== STRUCTURAL LEGALITY ====================

#[test]
fn test_class_inside_if_true_fails() {
    let err = compile("if true {\n  class foo {\n  }\n}").unwrap_err();
    assert!(err.is_structural());
}

#[test]
fn test_class_inside_if_false_fails() {
    let err = compile("if false {\n  class foo {\n  }\n}").unwrap_err();
    assert!(err.is_structural());
}

#[test]
fn test_failed_reload_reports_and_recovers() {
    let fixture = Fixture::new("notify { 'ok': }");
    fixture.compile("mynode").unwrap();

    fixture.clock.set(2);
    fixture.sources.set("site.pp", "if $x { define d { } }");
    assert!(fixture.compile("mynode").unwrap_err().is_structural());

    fixture.clock.set(3);
    fixture.sources.set("site.pp", "notify { 'fixed': }");
    let catalog = fixture.compile("mynode").unwrap();
    assert!(catalog.resource("Notify[fixed]").is_some());
}

// ==================== RESOURCES ====================

#[test]
fn test_duplicate_resource_across_classes() {
    let err = compile(
        "class a { file { '/tmp/x': } }
         class b { file { '/tmp/x': ensure => present } }
         include a, b",
    )
    .unwrap_err();
    match err.cause {
        EvalError::DuplicateResource { reference, first, second } => {
            assert_eq!(reference.to_string(), "File[/tmp/x]");
            assert_eq!(first.line, 1);
            assert_eq!(second.line, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_duplicate_resource_in_branches() {
    let err = compile(
        "if true { notify { 'x': } }
         unless false { notify { 'x': } }",
    )
    .unwrap_err();
    assert!(matches!(err.cause, EvalError::DuplicateResource { .. }));
}

#[test]
fn test_reinclude_is_noop() {
    let catalog = compile(
        "class foo {
           $once = 'set'
           notify { 'side effect': }
         }
         include foo
         include foo
         class bar { include foo }
         include bar",
    )
    .unwrap();
    let notifies = catalog
        .resources()
        .filter(|r| r.type_name() == "Notify")
        .count();
    assert_eq!(notifies, 1);
}

#[test]
fn test_namevar_and_contains_edges() {
    let catalog = compile("class web { file { '/var/www': ensure => directory } } include web").unwrap();
    let file = catalog.resource("File[/var/www]").unwrap();
    assert_eq!(file.parameter("path"), Some(&Value::from("/var/www")));
    assert!(file.finished);
    assert!(catalog.has_edge(
        &class("web"),
        &ResourceRef::new("file", "/var/www"),
        EdgeKind::Contains
    ));
    assert!(catalog.has_edge(&class("main"), &class("web"), EdgeKind::Contains));
}

#[test]
fn test_array_titles() {
    let catalog = compile("package { ['ntp', 'curl']: ensure => installed }").unwrap();
    assert!(catalog.resource("Package[ntp]").is_some());
    assert!(catalog.resource("Package[curl]").is_some());
}

#[test]
fn test_invalid_attribute_for_type() {
    let err = compile("notify { 'x': mode => '0644' }").unwrap_err();
    assert!(matches!(
        err.cause,
        EvalError::InvalidParameter { ref parameter, .. } if parameter == "mode"
    ));
}

#[test]
fn test_tags() {
    let catalog = compile("class web::app { notify { 'x': tag => 'frontend' } } include web::app").unwrap();
    let notify = catalog.resource("Notify[x]").unwrap();
    for tag in ["notify", "web::app", "web", "app", "frontend"] {
        assert!(notify.tagged(tag), "missing tag {tag}");
    }
}

#[test]
fn test_unknown_resource_type_then_registered() {
    let fixture = Fixture::new("nagios_host { 'web01': address => '10.0.0.1' }");
    let err = fixture.compile("mynode").unwrap_err();
    assert!(matches!(err.cause, EvalError::UnresolvedReference { .. }));

    fixture
        .compiler
        .registry()
        .register(ResourceTypeDescriptor::new("nagios_host").with_attributes(["address"]))
        .unwrap();
    let catalog = fixture.compile("mynode").unwrap();
    let host = catalog.resource("Nagios_host[web01]").unwrap();
    assert_eq!(host.parameter("name"), Some(&Value::from("web01")));
}

// ==================== RELATIONSHIPS ====================

#[test]
fn test_relationship_metaparameters_and_chains() {
    let catalog = compile(
        "package { 'ntp': }
         file { '/etc/ntp.conf': notify => Service['ntp'] }
         service { 'ntp': }
         exec { 'reload': subscribe => File['/etc/ntp.conf'] }
         Package['ntp'] -> File['/etc/ntp.conf']",
    )
    .unwrap();
    let package = ResourceRef::new("package", "ntp");
    let file = ResourceRef::new("file", "/etc/ntp.conf");
    let service = ResourceRef::new("service", "ntp");
    let exec = ResourceRef::new("exec", "reload");

    assert!(catalog.has_edge(&package, &file, EdgeKind::Before));
    assert!(catalog.has_edge(&file, &service, EdgeKind::Notify));
    assert!(catalog.has_edge(&file, &exec, EdgeKind::Notify));
}

#[test]
fn test_notify_chain() {
    let catalog = compile(
        "file { '/etc/app.conf': }
         service { 'app': }
         File['/etc/app.conf'] ~> Service['app']",
    )
    .unwrap();
    assert!(catalog.has_edge(
        &ResourceRef::new("file", "/etc/app.conf"),
        &ResourceRef::new("service", "app"),
        EdgeKind::Notify
    ));
}

#[test]
fn test_relationship_to_missing_resource() {
    let err = compile("notify { 'x': require => File['/nope'] }").unwrap_err();
    match err.cause {
        EvalError::UnresolvedReference { reference, .. } => assert_eq!(reference, "File[/nope]"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_require_function_orders_class_first() {
    let catalog = compile("class base { } class app { require base } include app").unwrap();
    assert!(catalog.has_edge(&class("base"), &class("app"), EdgeKind::Before));
}

// ==================== CLASSES, DEFINES, SCOPES ====================

#[test]
fn test_define_instances() {
    let catalog = compile(
        "define web::vhost($port = 80, $docroot = \"/srv/${title}\") {
           file { \"/etc/vhosts/${title}.conf\": content => \"port ${port} root ${docroot} name ${name}\" }
         }
         class web {
           vhost { 'a': port => 8080; 'b': }
         }
         include web",
    )
    .unwrap();

    let a = catalog.resource("File[/etc/vhosts/a.conf]").unwrap();
    assert_eq!(a.parameter("content"), Some(&Value::from("port 8080 root /srv/a name a")));
    let b = catalog.resource("File[/etc/vhosts/b.conf]").unwrap();
    assert_eq!(b.parameter("content"), Some(&Value::from("port 80 root /srv/b name b")));

    let instance = ResourceRef::new("web::vhost", "a");
    assert!(catalog.contains(&instance));
    assert!(catalog.has_edge(&class("web"), &instance, EdgeKind::Contains));
    assert!(catalog.has_edge(
        &instance,
        &ResourceRef::new("file", "/etc/vhosts/a.conf"),
        EdgeKind::Contains
    ));
}

#[test]
fn test_define_missing_and_unknown_parameters() {
    let err = compile("define d($required) { } d { 'x': }").unwrap_err();
    assert!(matches!(err.cause, EvalError::MissingParameter { ref parameter, .. } if parameter == "required"));

    let err = compile("define d { } d { 'x': bogus => 1 }").unwrap_err();
    assert!(matches!(err.cause, EvalError::InvalidParameter { ref parameter, .. } if parameter == "bogus"));
}

#[test]
fn test_resource_like_class() {
    let catalog = compile(
        "class ntp($server = 'pool.ntp.org') { notify { $server: } }
         class { 'ntp': server => 'time.example.com' }",
    )
    .unwrap();
    assert!(catalog.resource("Notify[time.example.com]").is_some());
    let ntp = catalog.resource_by_ref(&class("ntp")).unwrap();
    assert_eq!(ntp.parameter("server"), Some(&Value::from("time.example.com")));
}

#[test]
fn test_resource_like_class_after_include_is_duplicate() {
    let err = compile("class ntp($server = 'a') { } include ntp class { 'ntp': server => 'b' }").unwrap_err();
    assert!(matches!(err.cause, EvalError::DuplicateResource { .. }));
}

#[test]
fn test_inheritance() {
    let catalog = compile(
        "class base { $pkg = 'openssh' }
         class ssh inherits base { package { $pkg: } }
         include ssh",
    )
    .unwrap();
    assert!(catalog.resource("Package[openssh]").is_some());
    assert!(catalog.resource_by_ref(&class("base")).is_some());
}

#[test]
fn test_circular_inheritance() {
    let err = compile("class a inherits b { } class b inherits a { } include a").unwrap_err();
    assert!(matches!(err.cause, EvalError::CircularInheritance { .. }));
}

#[test]
fn test_variables_do_not_leak_between_classes() {
    let err = compile(
        "class a { $secret = 'x' }
         class b { notify { $secret: } }
         include a, b",
    )
    .unwrap_err();
    assert!(matches!(err.cause, EvalError::UndefinedVariable { ref variable, .. } if variable == "secret"));
}

#[test]
fn test_qualified_and_global_variables() {
    let catalog = compile(
        "$site = 'lab'
         class settings { $port = 8443 }
         class app {
           $site = 'shadowed'
           notify { \"${settings::port}-${::site}-${site}\": }
         }
         include settings, app",
    )
    .unwrap();
    assert!(catalog.resource("Notify[8443-lab-shadowed]").is_some());
}

#[test]
fn test_anchored_qualified_variable() {
    let catalog = compile(
        "class a { $x = 'v' }
         include a
         notify { $::a::x: }
         notify { \"anchored-${::a::x}\": }",
    )
    .unwrap();
    assert!(catalog.resource("Notify[v]").is_some());
    assert!(catalog.resource("Notify[anchored-v]").is_some());
}

#[test]
fn test_reassignment_fails() {
    let err = compile("$x = 1\n$x = 2").unwrap_err();
    assert!(matches!(err.cause, EvalError::Reassignment { .. }));
}

#[test]
fn test_non_strict_variables() {
    let config = CompilerConfig::default().with_strict_variables(false);
    let fixture = Fixture::with_config("notify { \"value:${missing}\": }", config);
    let catalog = fixture.compile("mynode").unwrap();
    assert!(catalog.resource("Notify[value:]").is_some());
}

#[test]
fn test_facts_environment_and_conditionals() {
    let fixture = Fixture::new(
        "case $osfamily {
           'RedHat', 'Fedora': { $pkg = 'httpd' }
           default: { $pkg = 'apache2' }
         }
         if $environment == 'PRODUCTION' and !$maintenance { package { $pkg: } }
         unless $environment != 'production' { notify { \"${environment}\": } }",
    );
    let node = Node::new("web01").with_fact("osfamily", "redhat");
    let node = node.with_fact("maintenance", "");
    let catalog = fixture.compiler.compile(&node, None).unwrap();
    assert!(catalog.resource("Package[httpd]").is_some());
    assert!(catalog.resource("Notify[production]").is_some());
    assert_eq!(catalog.environment, "production");
}

#[test]
fn test_fail_function() {
    let err = compile("fail('unsupported platform', 'solaris')").unwrap_err();
    match err.cause {
        EvalError::Failed { message, .. } => assert_eq!(message, "unsupported platform solaris"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_unknown_function() {
    let err = compile("frobnicate('x')").unwrap_err();
    assert!(matches!(err.cause, EvalError::UnknownFunction { .. }));
}

// ==================== NODES AND ENVIRONMENTS ====================

#[test]
fn test_node_definition_selected() {
    let fixture = Fixture::new(
        "class web { notify { 'web': } }
         class db { notify { 'db': } }
         node 'web01.example.com' { include web }
         node default { include db }",
    );
    let web = fixture.compile("web01.example.com").unwrap();
    assert!(web.resource("Notify[web]").is_some());
    assert!(web.resource("Node[web01.example.com]").is_some());
    assert!(web.resource("Notify[db]").is_none());

    let other = fixture.compile("mail01").unwrap();
    assert!(other.resource("Notify[db]").is_some());
}

#[test]
fn test_no_matching_node_definition() {
    let err = Fixture::new("node 'web01' { }").compile("db01").unwrap_err();
    assert_eq!(err.node, "db01");
    assert!(matches!(err.cause, EvalError::NoNodeDefinition { .. }));
}

#[test]
fn test_unknown_environment() {
    let fixture = Fixture::new("");
    let node = Node::new("mynode").with_environment("staging");
    let err = fixture.compiler.compile(&node, None).unwrap_err();
    assert!(matches!(err.cause, EvalError::UnknownEnvironment { ref name } if name == "staging"));
}

#[test]
fn test_concurrent_compiles() {
    let fixture = Fixture::new("class base { notify { 'base': } } include base notify { $clientname: }");
    let compiler = Arc::new(fixture.compiler);
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let compiler = Arc::clone(&compiler);
            std::thread::spawn(move || {
                let node = Node::new(format!("node{i}")).with_fact("clientname", format!("node{i}"));
                compiler.compile(&node, None).map(|catalog| catalog.len())
            })
        })
        .collect();
    for handle in handles {
        // Class[Main], Class[Base], Notify[base], Notify[nodeN]
        assert_eq!(handle.join().unwrap().unwrap(), 4);
    }
}
