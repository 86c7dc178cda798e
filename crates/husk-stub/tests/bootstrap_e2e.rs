//! End-to-end bootstrap scenarios.
//!
//! Exercises the full sequence against a simulated host context and an
//! in-memory loader backend, so no platform dynamic linker is involved.

use std::cell::Cell;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use husk_sdk::{
    AppEntry, ClassLoader, Component, ComponentFactory, Context, HostContext, PackageMetadata,
    PackageRegistry, PayloadData, PayloadError, PayloadRegistry,
};
use husk_stub::{
    module_paths, Bootstrap, DelegateComponentFactory, LoadError, LoaderBackend, ModuleFile,
    ModuleImage, FACTORY_CAPABLE_LEVEL,
};

// ============================================================================
// Payload fixture
// ============================================================================

// Each #[test] runs on its own thread, so thread-locals observe exactly the
// constructions made by that test's bootstrap.
thread_local! {
    static LAST_SCHEMA: Cell<Option<u32>> = const { Cell::new(None) };
    static ATTACH_COUNT: Cell<usize> = const { Cell::new(0) };
    static FACTORY_CALLS: Cell<usize> = const { Cell::new(0) };
}

struct ProbeEntry;

impl AppEntry for ProbeEntry {
    fn attach(&self, _context: Arc<dyn Context>) {
        ATTACH_COUNT.with(|c| c.set(c.get() + 1));
    }
}

fn probe_entry(data: Arc<PayloadData>) -> Result<Box<dyn AppEntry>, PayloadError> {
    LAST_SCHEMA.with(|c| c.set(Some(data.schema_version())));
    Ok(Box::new(ProbeEntry))
}

fn broken_entry(_data: Arc<PayloadData>) -> Result<Box<dyn AppEntry>, PayloadError> {
    Err(PayloadError::Init("refused to start".to_string()))
}

struct ProbeComponent(String);

impl Component for ProbeComponent {
    fn class_name(&self) -> &str {
        &self.0
    }
}

struct ProbeFactory;

impl ComponentFactory for ProbeFactory {
    fn instantiate(&self, class_name: &str) -> Option<Box<dyn Component>> {
        FACTORY_CALLS.with(|c| c.set(c.get() + 1));
        Some(Box::new(ProbeComponent(class_name.to_string())))
    }
}

fn probe_factory() -> Result<Box<dyn ComponentFactory>, PayloadError> {
    Ok(Box::new(ProbeFactory))
}

fn widget() -> Box<dyn Component> {
    Box::new(ProbeComponent("app::Widget".to_string()))
}

struct TestBackend;

impl LoaderBackend for TestBackend {
    fn load(&self, _module: &ModuleFile) -> Result<PayloadRegistry, LoadError> {
        let mut registry = PayloadRegistry::new("test-payload", "1.0.0");
        registry.register_entry("app::Main", probe_entry);
        registry.register_entry("app::Broken", broken_entry);
        registry.register_factory("app::Factory", probe_factory);
        registry.register_component("app::Widget", widget);
        Ok(registry)
    }
}

// ============================================================================
// Host fixture
// ============================================================================

const CANONICAL: &str = "app.husk";

struct MapPackages(HashMap<String, PathBuf>);

impl PackageRegistry for MapPackages {
    fn module_source(&self, package: &str) -> Option<PathBuf> {
        self.0.get(package).cloned()
    }
}

struct InitialLoader;

impl ClassLoader for InitialLoader {
    fn load_class(&self, _class_name: &str) -> Option<Box<dyn Component>> {
        None
    }
}

fn host(
    data_dir: &std::path::Path,
    package: &str,
    level: u32,
    installed: HashMap<String, PathBuf>,
) -> Arc<HostContext> {
    Arc::new(HostContext::new(
        PackageMetadata::new(package, data_dir, None, level),
        Arc::new(MapPackages(installed)),
        Arc::new(InitialLoader),
    ))
}

fn bootstrap(schema: u32) -> Bootstrap {
    Bootstrap::new(
        CANONICAL,
        PayloadData::new(schema, HashMap::new(), "stub::RootService"),
        Box::new(TestBackend),
    )
}

fn valid_image(entry: &str, factory: Option<&str>) -> ModuleImage {
    ModuleImage::new(1, entry, factory.map(str::to_string), b"payload code".to_vec())
}

fn reset_probes() {
    LAST_SCHEMA.with(|c| c.set(None));
    ATTACH_COUNT.with(|c| c.set(0));
    FACTORY_CALLS.with(|c| c.set(0));
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn scenario_a_nothing_available_yields_null() {
    reset_probes();
    let dir = tempfile::tempdir().unwrap();
    let boot = bootstrap(1);
    let ctx = host(dir.path(), "app.husk.secondary", FACTORY_CAPABLE_LEVEL, HashMap::new());

    let entry = boot.create_and_setup_app(ctx);

    assert!(entry.is_none());
    assert!(!boot.loader_slot().is_active());
    assert_eq!(ATTACH_COUNT.with(|c| c.get()), 0);
}

#[test]
fn scenario_b_pending_update_is_promoted_and_loaded() {
    reset_probes();
    let dir = tempfile::tempdir().unwrap();
    let boot = bootstrap(1);
    let ctx = host(dir.path(), CANONICAL, FACTORY_CAPABLE_LEVEL, HashMap::new());
    let paths = module_paths(ctx.metadata());

    fs::create_dir_all(paths.dir()).unwrap();
    let image_bytes = valid_image("app::Main", None).to_bytes();
    fs::write(paths.update(), &image_bytes).unwrap();

    let entry = boot.create_and_setup_app(ctx.clone());

    assert!(entry.is_some());
    assert!(boot.loader_slot().is_active());
    assert_eq!(fs::read(paths.current()).unwrap(), image_bytes);
    assert!(!paths.update().exists());
}

#[test]
fn scenario_c_failing_entry_deletes_module() {
    reset_probes();
    let dir = tempfile::tempdir().unwrap();
    let boot = bootstrap(1);
    let ctx = host(dir.path(), CANONICAL, FACTORY_CAPABLE_LEVEL, HashMap::new());
    let paths = module_paths(ctx.metadata());

    fs::create_dir_all(paths.dir()).unwrap();
    valid_image("app::Broken", None).write_file(paths.current()).unwrap();

    let entry = boot.create_and_setup_app(ctx.clone());

    assert!(entry.is_none());
    assert!(!paths.current().exists());
    // The facility stays Active even though the file is gone; the process
    // must restart to try a fresh module.
    assert!(boot.loader_slot().is_active());
    assert_eq!(ATTACH_COUNT.with(|c| c.get()), 0);
}

#[test]
fn scenario_d_entry_and_factory_installed() {
    reset_probes();
    let dir = tempfile::tempdir().unwrap();
    let delegate = Arc::new(DelegateComponentFactory::new());
    let boot = bootstrap(42).with_delegate(delegate.clone());
    let ctx = host(dir.path(), CANONICAL, FACTORY_CAPABLE_LEVEL, HashMap::new());
    let paths = module_paths(ctx.metadata());

    fs::create_dir_all(paths.dir()).unwrap();
    valid_image("app::Main", Some("app::Factory"))
        .write_file(paths.current())
        .unwrap();

    // Before bootstrap the delegate is a no-op.
    assert!(delegate.instantiate("app::Widget").is_none());
    assert_eq!(FACTORY_CALLS.with(|c| c.get()), 0);

    let entry = boot.create_and_setup_app(ctx.clone());

    assert!(entry.is_some());
    assert_eq!(LAST_SCHEMA.with(|c| c.get()), Some(42));
    assert_eq!(ATTACH_COUNT.with(|c| c.get()), 1);

    assert!(delegate.has_target());
    let component = delegate.instantiate("app::Widget").unwrap();
    assert_eq!(component.class_name(), "app::Widget");
    assert_eq!(FACTORY_CALLS.with(|c| c.get()), 1);
}

#[test]
fn unknown_entry_type_deletes_module() {
    reset_probes();
    let dir = tempfile::tempdir().unwrap();
    let boot = bootstrap(1);
    let ctx = host(dir.path(), CANONICAL, FACTORY_CAPABLE_LEVEL, HashMap::new());
    let paths = module_paths(ctx.metadata());

    fs::create_dir_all(paths.dir()).unwrap();
    // Valid container, but the manifest names a type the module never
    // registers a constructor for.
    valid_image("app::Unknown", None).write_file(paths.current()).unwrap();

    let entry = boot.create_and_setup_app(ctx.clone());

    assert!(entry.is_none());
    assert!(!paths.current().exists());
}

#[test]
fn corrupt_container_is_deleted() {
    reset_probes();
    let dir = tempfile::tempdir().unwrap();
    let boot = bootstrap(1);
    let ctx = host(dir.path(), CANONICAL, FACTORY_CAPABLE_LEVEL, HashMap::new());
    let paths = module_paths(ctx.metadata());

    fs::create_dir_all(paths.dir()).unwrap();
    let mut bytes = valid_image("app::Main", None).to_bytes();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    fs::write(paths.current(), &bytes).unwrap();

    let entry = boot.create_and_setup_app(ctx.clone());

    assert!(entry.is_none());
    assert!(!paths.current().exists());
    assert!(!boot.loader_slot().is_active());
}

#[test]
fn secondary_package_imports_canonical_module() {
    reset_probes();
    let dir = tempfile::tempdir().unwrap();

    // The canonical installation's module lives elsewhere on disk.
    let canonical_src = dir.path().join("canonical.mod");
    let image_bytes = valid_image("app::Main", None).to_bytes();
    fs::write(&canonical_src, &image_bytes).unwrap();

    let mut installed = HashMap::new();
    installed.insert(CANONICAL.to_string(), canonical_src);

    let boot = bootstrap(1);
    let ctx = host(
        &dir.path().join("secondary"),
        "app.husk.secondary",
        FACTORY_CAPABLE_LEVEL,
        installed,
    );
    let paths = module_paths(ctx.metadata());

    let entry = boot.create_and_setup_app(ctx.clone());

    assert!(entry.is_some());
    assert!(boot.loader_slot().is_active());
    assert_eq!(fs::read(paths.current()).unwrap(), image_bytes);
}

#[test]
fn rebasing_and_delegation_are_mutually_exclusive() {
    for level in 0..=FACTORY_CAPABLE_LEVEL + 2 {
        reset_probes();
        let dir = tempfile::tempdir().unwrap();
        let delegate = Arc::new(DelegateComponentFactory::new());
        let boot = bootstrap(1).with_delegate(delegate.clone());
        let ctx = host(dir.path(), CANONICAL, level, HashMap::new());
        let paths = module_paths(ctx.metadata());

        fs::create_dir_all(paths.dir()).unwrap();
        valid_image("app::Main", Some("app::Factory"))
            .write_file(paths.current())
            .unwrap();

        let loader_before = ctx.class_loader();
        let entry = boot.create_and_setup_app(ctx.clone());
        assert!(entry.is_some(), "level {}", level);

        let rebased = !Arc::ptr_eq(&loader_before, &ctx.class_loader());
        let delegated = delegate.has_target();

        assert_eq!(rebased, level < FACTORY_CAPABLE_LEVEL, "level {}", level);
        assert_eq!(delegated, level >= FACTORY_CAPABLE_LEVEL, "level {}", level);
        assert_ne!(rebased, delegated, "level {}", level);
    }
}

#[test]
fn rebased_context_resolves_payload_components() {
    reset_probes();
    let dir = tempfile::tempdir().unwrap();
    let boot = bootstrap(1);
    let level = FACTORY_CAPABLE_LEVEL - 1;
    let ctx = host(dir.path(), CANONICAL, level, HashMap::new());
    let paths = module_paths(ctx.metadata());

    fs::create_dir_all(paths.dir()).unwrap();
    valid_image("app::Main", None).write_file(paths.current()).unwrap();

    assert!(ctx.class_loader().load_class("app::Widget").is_none());
    boot.create_and_setup_app(ctx.clone()).unwrap();

    // The host now resolves payload classes through the swapped loader.
    let component = ctx.class_loader().load_class("app::Widget").unwrap();
    assert_eq!(component.class_name(), "app::Widget");
}

#[test]
fn second_bootstrap_call_reuses_active_module() {
    reset_probes();
    let dir = tempfile::tempdir().unwrap();
    let boot = bootstrap(1);
    let ctx = host(dir.path(), CANONICAL, FACTORY_CAPABLE_LEVEL, HashMap::new());
    let paths = module_paths(ctx.metadata());

    fs::create_dir_all(paths.dir()).unwrap();
    valid_image("app::Main", None).write_file(paths.current()).unwrap();

    assert!(boot.create_and_setup_app(ctx.clone()).is_some());
    // Staging an update now must not disturb the already-active facility.
    fs::write(paths.update(), valid_image("app::Main", None).to_bytes()).unwrap();

    assert!(boot.create_and_setup_app(ctx.clone()).is_some());
    assert!(boot.loader_slot().is_active());
    assert!(paths.update().exists());
}
