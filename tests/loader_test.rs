//! Loader core behavior: dependency ordering, registry invariants, and
//! lifecycle operations driven end to end over on-disk manifests.

mod common;

use common::{loader_with, write_bootstrap_components, ModsDir, ReadyDriver};
use modhost_core::mods::{LoaderError, ModState, ResolveError};

#[test]
fn load_pulls_in_dependencies_in_order() {
    // Manifests: A (no deps), B depends on A, C independent.
    let mods = ModsDir::new();
    mods.add_mod("a", &[]).add_mod("b", &["a"]).add_mod("c", &[]);
    let (loader, log) = loader_with(&mods);

    loader.load_mod("b").unwrap();

    let snapshots = loader.loaded_mods();
    let ids: Vec<&str> = snapshots.iter().map(|s| s.manifest.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert!(snapshots.iter().all(|s| s.state == ModState::Running));
    assert!(snapshots[0].load_timestamp < snapshots[1].load_timestamp);
    assert!(!loader.is_mod_loaded("c"));
    assert_eq!(log.count("a", "load"), 1);
    assert_eq!(log.count("b", "load"), 1);
}

#[test]
fn independent_dependencies_load_in_discovery_order() {
    // "omega" lists zeta before alpha, but the directory scan discovers
    // alpha first, and discovery order breaks the tie.
    let mods = ModsDir::new();
    mods.add_mod("zeta", &[])
        .add_mod("alpha", &[])
        .add_mod("omega", &["zeta", "alpha"]);
    let (loader, _log) = loader_with(&mods);

    loader.load_mod("omega").unwrap();

    let ids: Vec<String> = loader
        .loaded_mods()
        .iter()
        .map(|s| s.manifest.id.clone())
        .collect();
    assert_eq!(ids, vec!["alpha", "zeta", "omega"]);
}

#[test]
fn dependency_timestamps_strictly_increase_transitively() {
    let mods = ModsDir::new();
    mods.add_mod("base", &[])
        .add_mod("mid", &["base"])
        .add_mod("top", &["mid"]);
    let (loader, _log) = loader_with(&mods);

    loader.load_mod("top").unwrap();

    let snapshots = loader.loaded_mods();
    assert_eq!(snapshots.len(), 3);
    for pair in snapshots.windows(2) {
        assert!(pair[0].load_timestamp < pair[1].load_timestamp);
    }
}

#[test]
fn duplicate_load_is_rejected_without_mutation() {
    let mods = ModsDir::new();
    mods.add_mod("solo", &[]);
    let (loader, log) = loader_with(&mods);

    loader.load_mod("solo").unwrap();
    let err = loader.load_mod("solo").unwrap_err();

    assert!(matches!(err, LoaderError::AlreadyLoaded(id) if id == "solo"));
    assert_eq!(loader.loaded_count(), 1);
    assert_eq!(log.count("solo", "load"), 1);
}

#[test]
fn empty_id_is_invalid() {
    let mods = ModsDir::new();
    let (loader, _log) = loader_with(&mods);
    let err = loader.load_mod("").unwrap_err();
    assert!(matches!(err, LoaderError::InvalidModId(_)));
    assert_eq!(loader.loaded_count(), 0);
}

#[test]
fn unknown_id_is_invalid() {
    let mods = ModsDir::new();
    mods.add_mod("real", &[]);
    let (loader, _log) = loader_with(&mods);
    let err = loader.load_mod("imaginary").unwrap_err();
    assert!(matches!(err, LoaderError::InvalidModId(id) if id == "imaginary"));
    assert_eq!(loader.loaded_count(), 0);
}

#[test]
fn unload_does_not_cascade_to_dependencies() {
    // E depends on C; unloading E leaves C resident.
    let mods = ModsDir::new();
    mods.add_mod("c", &[]).add_mod("e", &["c"]);
    let (loader, log) = loader_with(&mods);

    loader.load_mod("e").unwrap();
    assert!(loader.is_mod_loaded("c"));
    assert!(loader.is_mod_loaded("e"));

    loader.unload_mod("e").unwrap();
    assert!(!loader.is_mod_loaded("e"));
    assert!(loader.is_mod_loaded("c"));
    assert_eq!(log.count("e", "unload"), 1);
    assert_eq!(log.count("c", "unload"), 0);
}

#[test]
fn unload_of_shared_dependency_leaves_dependents_running() {
    let mods = ModsDir::new();
    mods.add_mod("dep", &[]).add_mod("user", &["dep"]);
    let (loader, _log) = loader_with(&mods);

    loader.load_mod("user").unwrap();
    loader.unload_mod("dep").unwrap();

    assert!(!loader.is_mod_loaded("dep"));
    assert!(loader.is_mod_loaded("user"));
    let snapshots = loader.loaded_mods();
    assert_eq!(snapshots[0].manifest.id, "user");
    assert_eq!(snapshots[0].state, ModState::Running);
}

#[test]
fn cycle_fails_before_any_load_side_effects() {
    let mods = ModsDir::new();
    mods.add_mod("a", &["b"]).add_mod("b", &["a"]);
    let (loader, log) = loader_with(&mods);

    let err = loader.load_mod("a").unwrap_err();
    assert!(matches!(
        err,
        LoaderError::Resolve(ResolveError::CyclicDependency { .. })
    ));
    assert_eq!(loader.loaded_count(), 0);
    assert_eq!(log.count("a", "load"), 0);
    assert_eq!(log.count("b", "load"), 0);
}

#[test]
fn missing_dependency_reports_offender() {
    let mods = ModsDir::new();
    mods.add_mod("orphan", &["ghost"]);
    let (loader, _log) = loader_with(&mods);

    let err = loader.load_mod("orphan").unwrap_err();
    match err {
        LoaderError::Resolve(ResolveError::MissingDependency { missing, chain }) => {
            assert_eq!(missing, "ghost");
            assert_eq!(chain, vec!["orphan"]);
        }
        other => panic!("expected MissingDependency, got {other}"),
    }
}

#[test]
fn suspend_without_capability_is_unsupported_and_hook_free() {
    let mods = ModsDir::new();
    mods.add_mod_full("rigid", &[], false, true, false);
    let (loader, log) = loader_with(&mods);

    loader.load_mod("rigid").unwrap();
    let err = loader.suspend_mod("rigid").unwrap_err();

    assert!(matches!(err, LoaderError::Instance(_)));
    assert_eq!(loader.loaded_mods()[0].state, ModState::Running);
    assert_eq!(log.count("rigid", "suspend"), 0);
}

#[test]
fn suspend_resume_round_trip_invokes_each_hook_once() {
    let mods = ModsDir::new();
    mods.add_mod_full("flex", &[], true, true, false);
    let (loader, log) = loader_with(&mods);

    loader.load_mod("flex").unwrap();
    loader.suspend_mod("flex").unwrap();
    assert_eq!(loader.loaded_mods()[0].state, ModState::Suspended);
    loader.resume_mod("flex").unwrap();
    assert_eq!(loader.loaded_mods()[0].state, ModState::Running);
    assert_eq!(log.count("flex", "suspend"), 1);
    assert_eq!(log.count("flex", "resume"), 1);
}

#[test]
fn unload_without_capability_is_unsupported() {
    let mods = ModsDir::new();
    mods.add_mod_full("pinned", &[], true, false, false);
    let (loader, log) = loader_with(&mods);

    loader.load_mod("pinned").unwrap();
    assert!(loader.unload_mod("pinned").is_err());
    assert!(loader.is_mod_loaded("pinned"));
    assert_eq!(log.count("pinned", "unload"), 0);
}

#[test]
fn failing_load_hook_keeps_earlier_dependencies() {
    let mods = ModsDir::new();
    mods.add_mod("dep", &[]).add_mod("broken", &["dep"]);
    let (loader, log) = loader_with(&mods);
    log.fail_load_of("broken");

    let err = loader.load_mod("broken").unwrap_err();
    assert!(matches!(err, LoaderError::LoadHookFailed { .. }));
    // The dependency loaded before the failure stays resident.
    assert!(loader.is_mod_loaded("dep"));
    assert!(!loader.is_mod_loaded("broken"));
}

#[test]
fn operations_on_unknown_ids_fail_with_invalid_mod_id() {
    let mods = ModsDir::new();
    let (loader, _log) = loader_with(&mods);
    assert!(matches!(
        loader.unload_mod("nope"),
        Err(LoaderError::InvalidModId(_))
    ));
    assert!(matches!(
        loader.suspend_mod("nope"),
        Err(LoaderError::InvalidModId(_))
    ));
    assert!(matches!(
        loader.resume_mod("nope"),
        Err(LoaderError::InvalidModId(_))
    ));
}

#[test]
fn attach_loads_auto_load_mods_and_is_idempotent() {
    let mods = ModsDir::new();
    mods.add_mod_full("boot", &["lib"], true, true, true)
        .add_mod_full("lib", &[], true, true, false)
        .add_mod_full("manual", &[], true, true, false);
    write_bootstrap_components(&mods.root().join("install"));
    let (loader, log) = loader_with(&mods);

    loader
        .load_for_current_process_with(&mut ReadyDriver)
        .unwrap();

    // lib is pulled in as a dependency of the auto-load mod.
    assert!(loader.is_mod_loaded("boot"));
    assert!(loader.is_mod_loaded("lib"));
    assert!(!loader.is_mod_loaded("manual"));

    // Second attach changes nothing.
    loader
        .load_for_current_process_with(&mut ReadyDriver)
        .unwrap();
    assert_eq!(loader.loaded_count(), 2);
    assert_eq!(log.count("boot", "load"), 1);
}

#[test]
fn attach_fails_without_bootstrap_components() {
    let mods = ModsDir::new();
    mods.add_mod_full("boot", &[], true, true, true);
    // No install dir written.
    let (loader, _log) = loader_with(&mods);

    let err = loader
        .load_for_current_process_with(&mut ReadyDriver)
        .unwrap_err();
    assert!(matches!(err, LoaderError::Inject(_)));
    assert_eq!(loader.loaded_count(), 0);
}

#[test]
fn reload_after_unload_succeeds() {
    let mods = ModsDir::new();
    mods.add_mod("phoenix", &[]);
    let (loader, log) = loader_with(&mods);

    loader.load_mod("phoenix").unwrap();
    loader.unload_mod("phoenix").unwrap();
    loader.load_mod("phoenix").unwrap();

    assert!(loader.is_mod_loaded("phoenix"));
    assert_eq!(log.count("phoenix", "load"), 2);
    assert_eq!(log.count("phoenix", "unload"), 1);
}
