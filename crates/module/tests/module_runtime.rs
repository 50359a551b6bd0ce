//! Behavior tests spanning scanning, registry, sandbox and environment.

use loadstone_core::{Name, Version};
use loadstone_module::metadata::DependencyInfo;
use loadstone_module::sandbox::{Permission, PermissionSet, StandardPermissionProviderFactory};
use loadstone_module::{
    ModuleEnvironment, ModuleFactory, ModuleManifest, ModuleMetadata, ModulePathScanner,
    ModuleRegistry, TypeResolution,
};
use std::fs;
use std::path::Path;

fn write_module(
    root: &Path,
    id: &str,
    version: Version,
    dependencies: &[&str],
    types: &[&str],
    permissions: &[&str],
) {
    let dir = root.join(format!("{id}-{version}"));
    fs::create_dir_all(&dir).unwrap();

    let mut metadata = ModuleMetadata::new(id, version);
    metadata.dependencies = dependencies
        .iter()
        .map(|dep| DependencyInfo::new(*dep, Version::new(1, 0, 0)))
        .collect();
    metadata.required_permissions = permissions.iter().map(|p| p.to_string()).collect();
    fs::write(dir.join("module.json"), metadata.to_vec().unwrap()).unwrap();

    let mut manifest = ModuleManifest::default();
    manifest.types = types.iter().map(|t| t.to_string()).collect();
    fs::write(
        dir.join("manifest.json"),
        serde_json::to_vec(&manifest).unwrap(),
    )
    .unwrap();
}

fn scan(root: &Path) -> ModuleRegistry {
    let scanner = ModulePathScanner::new(ModuleFactory::new());
    let mut registry = ModuleRegistry::new();
    scanner.scan(&mut registry, root);
    registry
}

#[test]
fn test_registry_latest_version_scenario() {
    let root = tempfile::tempdir().unwrap();
    write_module(root.path(), "mod", Version::new(1, 0, 0), &[], &[], &[]);
    write_module(root.path(), "mod", Version::new(2, 0, 0), &[], &[], &[]);

    let mut registry = scan(root.path());
    let id = Name::from("mod");
    assert_eq!(
        registry.get_latest_module_version(&id),
        Some(Version::new(2, 0, 0))
    );

    registry.remove(&id, Version::new(2, 0, 0));
    assert_eq!(
        registry.get_latest_module_version(&id),
        Some(Version::new(1, 0, 0))
    );
}

#[test]
fn test_environment_from_scanned_modules() {
    let root = tempfile::tempdir().unwrap();
    write_module(
        root.path(),
        "app",
        Version::new(1, 0, 0),
        &["lib"],
        &["app::Game"],
        &[],
    );
    write_module(
        root.path(),
        "lib",
        Version::new(1, 2, 0),
        &["base"],
        &["lib::Helper"],
        &[],
    );
    write_module(
        root.path(),
        "base",
        Version::new(1, 0, 0),
        &[],
        &["base::Core"],
        &[],
    );

    let registry = scan(root.path());
    let environment = ModuleEnvironment::new(
        registry.iter().cloned().collect(),
        &StandardPermissionProviderFactory::new(),
    )
    .unwrap();

    let order: Vec<String> = environment
        .modules()
        .iter()
        .map(|m| m.id().to_string())
        .collect();
    assert_eq!(order, vec!["base", "lib", "app"]);

    assert_eq!(
        environment.dependencies_of(&Name::from("app")),
        [Name::from("base"), Name::from("lib")].into_iter().collect()
    );
    assert_eq!(
        environment.get_module_providing("lib::Helper"),
        Some(Name::from("lib"))
    );
}

#[test]
fn test_sandboxed_type_visibility_across_modules() {
    let root = tempfile::tempdir().unwrap();
    // "open" declares the permission set exposing base's types, "sealed"
    // does not
    write_module(
        root.path(),
        "base",
        Version::new(1, 0, 0),
        &[],
        &["base::Core"],
        &[],
    );
    write_module(
        root.path(),
        "open",
        Version::new(1, 0, 0),
        &["base"],
        &["open::Thing"],
        &["base-api"],
    );
    write_module(
        root.path(),
        "sealed",
        Version::new(1, 0, 0),
        &["base"],
        &["sealed::Thing"],
        &[],
    );

    let mut base_api = PermissionSet::new();
    base_api.add_api_package("base");
    base_api.grant_to_type("io", "engine::api::Files");
    let mut permissions = StandardPermissionProviderFactory::new();
    permissions.register_set("base-api", base_api);

    let registry = scan(root.path());
    let environment =
        ModuleEnvironment::new(registry.iter().cloned().collect(), &permissions).unwrap();

    assert_eq!(
        environment.resolve_type(&Name::from("open"), "base::Core"),
        Some(TypeResolution::Module(Name::from("base")))
    );
    assert_eq!(
        environment.resolve_type(&Name::from("sealed"), "base::Core"),
        None
    );
    // own types resolve regardless of permissions
    assert_eq!(
        environment.resolve_type(&Name::from("sealed"), "sealed::Thing"),
        Some(TypeResolution::Module(Name::from("sealed")))
    );

    // scoped permission: only valid through the granted API surface
    let io = Permission::from("io");
    assert!(environment.check_permission(&Name::from("open"), &io, "engine::api::Files"));
    assert!(!environment.check_permission(&Name::from("open"), &io, "open::Sneaky"));
    assert!(!environment.check_permission(&Name::from("sealed"), &io, "engine::api::Files"));
}

#[test]
fn test_environment_resources_union_all_modules() {
    let root = tempfile::tempdir().unwrap();
    for id in ["base", "extra"] {
        let dir = root.path().join(id);
        fs::create_dir_all(dir.join("assets")).unwrap();
        let metadata = ModuleMetadata::new(id, Version::new(1, 0, 0));
        fs::write(dir.join("module.json"), metadata.to_vec().unwrap()).unwrap();
        fs::write(dir.join("assets").join(format!("{id}.txt")), id).unwrap();
    }

    let registry = scan(root.path());
    let environment = ModuleEnvironment::new(
        registry.iter().cloned().collect(),
        &StandardPermissionProviderFactory::new(),
    )
    .unwrap();

    let resources = environment.resources().unwrap();
    assert!(resources.get_file(&["assets", "base.txt"]).is_some());
    assert!(resources.get_file(&["assets", "extra.txt"]).is_some());

    environment.close();
    assert!(environment.resources().is_none());
}
