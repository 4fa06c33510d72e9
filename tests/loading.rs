mod common;

use common::{progress_log, recorder, Fixture, HostReply, MockHost, MockStore};
use futures::executor::block_on;
use platformer_core::catalog::{Catalog, LevelDef};
use platformer_core::config::{GameConfig, LoadingConfig};
use platformer_core::error::{CatalogError, HostError, LoadError};
use platformer_core::host::AudioSettings;
use platformer_core::loading::{
    LoadingCoordinator, LoadingPlan, LoadingProgress, LoadingStep, StepTask,
};

fn pacing_plan(weights: &[u32]) -> LoadingPlan {
    let steps = weights
        .iter()
        .enumerate()
        .map(|(i, &weight)| {
            LoadingStep::new(
                &format!("step-{}", i),
                weight,
                &format!("Step {}", i),
                StepTask::Pacing {
                    duration_ms: i as u32,
                },
            )
        })
        .collect();
    LoadingPlan::new(steps).unwrap()
}

fn standard(fixture: &Fixture, config: &GameConfig) -> LoadingCoordinator<MockStore> {
    LoadingCoordinator::new(
        LoadingPlan::standard(config),
        config.loading.clone(),
        fixture.default_deps(),
    )
}

fn numbers(log: &[LoadingProgress]) -> Vec<u8> {
    log.iter().map(|p| p.progress).collect()
}

#[test]
fn steps_report_their_weight_prefix_and_cap_at_99() {
    let fixture = Fixture::new(MockStore::default(), MockHost::default());
    let loader = LoadingCoordinator::new(
        pacing_plan(&[10, 30, 60]),
        LoadingConfig::default(),
        fixture.default_deps(),
    );
    let log = progress_log();
    loader.set_progress_callback(recorder(&log));

    block_on(loader.load()).unwrap();

    assert_eq!(numbers(&log.borrow()), vec![0, 10, 10, 40, 40, 99, 100]);
    assert_eq!(*fixture.sleeper.requested.borrow(), vec![0, 1, 2]);
    let last = log.borrow().last().cloned().unwrap();
    assert!(last.is_complete);
    assert_eq!(last.progress, 100);
    assert_eq!(last.error, None);
    assert_eq!(loader.progress(), last);
}

#[test]
fn heavy_leading_step_holds_at_99_until_complete() {
    let fixture = Fixture::new(MockStore::default(), MockHost::default());
    let loader = LoadingCoordinator::new(
        pacing_plan(&[399, 1]),
        LoadingConfig::default(),
        fixture.default_deps(),
    );
    let log = progress_log();
    loader.set_progress_callback(recorder(&log));

    block_on(loader.load()).unwrap();

    // 399/400 rounds to 100, but only the final snapshot may say so
    assert_eq!(numbers(&log.borrow()), vec![0, 99, 99, 99, 100]);
    let log = log.borrow();
    assert_eq!(log[2].current_step, "step-1");
    assert!(log[..4].iter().all(|p| !p.is_complete));
}

#[test]
fn step_start_uses_rounded_share_of_total() {
    let fixture = Fixture::new(MockStore::default(), MockHost::default());
    let loader = LoadingCoordinator::new(
        pacing_plan(&[1, 1, 1]),
        LoadingConfig::default(),
        fixture.default_deps(),
    );
    let log = progress_log();
    loader.set_progress_callback(recorder(&log));

    block_on(loader.load()).unwrap();

    let log = log.borrow();
    let starts: Vec<u8> = ["step-0", "step-1", "step-2"]
        .iter()
        .map(|id| log.iter().find(|p| p.current_step == *id).unwrap().progress)
        .collect();
    assert_eq!(starts, vec![0, 33, 67]);
    assert!(log[..log.len() - 1].iter().all(|p| !p.is_complete));
}

#[test]
fn standard_run_is_monotonic_and_ends_complete() {
    let fixture = Fixture::new(MockStore::default(), MockHost::default());
    let config = GameConfig::default();
    let loader = standard(&fixture, &config);
    let log = progress_log();
    loader.set_progress_callback(recorder(&log));

    block_on(loader.load()).unwrap();

    let log = log.borrow();
    let values = numbers(&log);
    assert!(values.windows(2).all(|pair| pair[0] <= pair[1]), "{:?}", values);
    assert_eq!(
        log.last().unwrap(),
        &LoadingProgress {
            current_step: "complete".to_string(),
            current_message: "Ready!".to_string(),
            progress: 100,
            is_complete: true,
            error: None,
        }
    );
    assert_eq!(log.iter().filter(|p| p.progress == 100).count(), 1);
    assert!(loader.is_complete());
    assert!(!loader.is_loading());
    assert!(loader.warnings().is_empty());
}

#[test]
fn broken_background_is_a_warning_not_a_failure() {
    let store = MockStore::default();
    store.break_path("assets/backgrounds/forest/2.png");
    let fixture = Fixture::new(store, MockHost::default());
    let loader = standard(&fixture, &GameConfig::default());
    let log = progress_log();
    loader.set_progress_callback(recorder(&log));

    block_on(loader.load()).unwrap();

    assert!(log.borrow().last().unwrap().is_complete);
    let warnings = loader.warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].step, "background-images");
    assert_eq!(warnings[0].path, "assets/backgrounds/forest/2.png");
    assert!(warnings[0].reason.contains("decode error"));
}

#[test]
fn failed_handshake_stops_before_any_other_step() {
    let host = MockHost::replying(vec![HostReply::Fail(HostError::Unavailable(
        "no parent".to_string(),
    ))]);
    let fixture = Fixture::new(MockStore::default(), host);
    let loader = standard(&fixture, &GameConfig::default());
    let log = progress_log();
    loader.set_progress_callback(recorder(&log));

    let result = block_on(loader.load());

    assert!(matches!(result, Err(LoadError::Handshake(_))));
    assert!(fixture.store.fetched.borrow().is_empty());
    assert!(fixture.sleeper.requested.borrow().is_empty());
    let last = log.borrow().last().cloned().unwrap();
    assert_eq!(last.progress, 0);
    assert!(!last.is_complete);
    assert_eq!(last.current_step, "init");
    assert!(!last.error.unwrap_or_default().is_empty());
    assert!(!loader.is_loading());
    assert!(!loader.is_complete());
}

#[test]
fn invalid_catalog_is_fatal() {
    let fixture = Fixture::new(MockStore::default(), MockHost::default());
    let config = GameConfig::default();
    let loader = LoadingCoordinator::new(
        LoadingPlan::standard(&config),
        config.loading.clone(),
        fixture.deps(Catalog::new(vec![LevelDef::new("lonely", "", "forest")])),
    );

    let result = block_on(loader.load());

    assert_eq!(
        result,
        Err(LoadError::Catalog(CatalogError::MissingName(
            "lonely".to_string()
        )))
    );
    assert!(fixture.store.fetched.borrow().is_empty());
    let progress = loader.progress();
    assert_eq!(progress.current_step, "levels");
    assert_eq!(progress.progress, 0);
    assert_eq!(progress.current_message, result.unwrap_err().user_message());
}

#[test]
fn reentrant_load_is_rejected() {
    let fixture = Fixture::new(MockStore::default(), MockHost::default());
    let loader = standard(&fixture, &GameConfig::default());

    let (first, second) = block_on(async { futures::join!(loader.load(), loader.load()) });

    assert_eq!(first, Ok(()));
    assert_eq!(second, Err(LoadError::AlreadyLoading));
    assert_eq!(fixture.host.calls.get(), 1);
}

#[test]
fn fatal_failure_can_be_retried_from_scratch() {
    let settings = AudioSettings {
        muted: true,
        ..AudioSettings::default()
    };
    let host = MockHost::replying(vec![
        HostReply::Fail(HostError::Malformed("garbage".to_string())),
        HostReply::Settings(settings),
    ]);
    let fixture = Fixture::new(MockStore::default(), host);
    let loader = standard(&fixture, &GameConfig::default());
    let log = progress_log();
    loader.set_progress_callback(recorder(&log));

    assert!(block_on(loader.load()).is_err());
    let failed_at = log.borrow().len();
    assert_eq!(loader.audio_settings(), None);

    block_on(loader.load()).unwrap();

    let log = log.borrow();
    assert_eq!(log[failed_at].current_step, "init");
    assert_eq!(log[failed_at].progress, 0);
    assert!(log.last().unwrap().is_complete);
    assert_eq!(loader.audio_settings(), Some(settings));
    assert_eq!(fixture.host.calls.get(), 2);
}

#[test]
fn load_after_success_does_nothing() {
    let fixture = Fixture::new(MockStore::default(), MockHost::default());
    let loader = standard(&fixture, &GameConfig::default());
    let log = progress_log();
    loader.set_progress_callback(recorder(&log));

    block_on(loader.load()).unwrap();
    let emitted = log.borrow().len();
    let fetched = fixture.store.fetched.borrow().len();

    assert_eq!(block_on(loader.load()), Ok(()));
    assert_eq!(log.borrow().len(), emitted);
    assert_eq!(fixture.store.fetched.borrow().len(), fetched);
}

#[test]
fn silent_host_times_out_when_configured() {
    let fixture = Fixture::new(
        MockStore::default(),
        MockHost::replying(vec![HostReply::Silent]),
    );
    let mut config = GameConfig::default();
    config.loading.handshake_timeout_ms = Some(250);
    let loader = standard(&fixture, &config);

    let result = block_on(loader.load());

    assert_eq!(result, Err(LoadError::Handshake(HostError::Timeout(250))));
    assert_eq!(*fixture.sleeper.requested.borrow(), vec![250]);
}

#[test]
fn prefetch_is_batched_with_flavor_checkpoints() {
    let fixture = Fixture::new(MockStore::default(), MockHost::default());
    let mut config = GameConfig::default();
    config.loading.batch_size = 2;
    config.assets.sprites = (1..=5).map(|i| format!("sprites/{}.png", i)).collect();
    config.assets.backgrounds.clear();
    config.assets.audio.clear();
    let loader = standard(&fixture, &config);
    let log = progress_log();
    loader.set_progress_callback(recorder(&log));

    block_on(loader.load()).unwrap();

    assert_eq!(fixture.store.max_in_flight.get(), 2);
    assert_eq!(fixture.store.fetched.borrow().len(), 5);
    let log = log.borrow();
    let flavors: Vec<&LoadingProgress> = log
        .iter()
        .filter(|p| config.loading.flavor_messages.contains(&p.current_message))
        .collect();
    assert_eq!(flavors.len(), 3);
    assert!(flavors.iter().all(|p| p.current_step == "sprites"));
    // flavour text never moves the number
    assert!(flavors.iter().all(|p| p.progress == 20));
    assert_eq!(flavors[0].current_message, config.loading.flavor_messages[0]);
    assert_eq!(flavors[1].current_message, config.loading.flavor_messages[1]);
}
