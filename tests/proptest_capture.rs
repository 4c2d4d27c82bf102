//! Property-based tests for the capture service and local store.
//!
//! These tests verify:
//! - Configurations reach the engine exactly as given
//! - Retrieve arguments and pages pass through unchanged
//! - Only the most recently registered notifier is invoked
//! - Paging the store with `next_anchor` visits every record once, in order

#![allow(clippy::float_cmp)]

mod helpers;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use helpers::{Call, RecordingEngine};
use location_capture_core::store::CaptureStorage;
use location_capture_core::{
    Anchor, CaptureConfiguration, CaptureEngine, CapturedLocation, EventEmitter, LocationCapture,
    Platform, RetrieveResult, LOCATION_RECEIVED,
};
use proptest::prelude::*;
use serde_json::Value;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

fn service() -> (Arc<RecordingEngine>, LocationCapture) {
    let engine = RecordingEngine::new();
    let device = Arc::new(EventEmitter::new());
    let dyn_engine: Arc<dyn CaptureEngine> = engine.clone();
    (
        engine,
        LocationCapture::new(Platform::Ios, Some(dyn_engine), &device),
    )
}

/// Arbitrary JSON scalars for configuration values.
fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 _+-]{0,16}".prop_map(Value::from),
    ]
}

fn config_strategy() -> impl Strategy<Value = CaptureConfiguration> {
    prop::collection::btree_map("[a-z_]{1,12}", scalar_strategy(), 0..8).prop_map(|entries| {
        entries
            .into_iter()
            .fold(CaptureConfiguration::new(), |config, (k, v)| config.with(k, v))
    })
}

fn location_strategy() -> impl Strategy<Value = CapturedLocation> {
    (0i64..2_000_000_000, -90.0f64..=90.0, -180.0f64..=180.0, 0.0f64..500.0)
        .prop_map(|(ts, lat, lon, acc)| CapturedLocation::new(ts, lat, lon, acc))
}

proptest! {
    #[test]
    fn configure_forwards_any_configuration(config in config_strategy()) {
        let (engine, capture) = service();

        runtime().block_on(capture.configure(config.clone())).unwrap();

        prop_assert_eq!(engine.calls(), vec![Call::Configure(config)]);
    }

    #[test]
    fn retrieve_is_transparent(
        anchor in prop::option::of("[0-9a-f]{0,12}"),
        limit in prop::option::of(0u32..1_000),
        locations in prop::collection::vec(location_strategy(), 0..10),
        next in "[0-9a-f]{1,12}",
    ) {
        let (engine, capture) = service();
        let page = RetrieveResult { locations, next_anchor: Anchor::new(next) };
        engine.set_page(page.clone());
        let anchor = anchor.map(Anchor::new);

        let result = runtime().block_on(capture.retrieve(anchor.clone(), limit)).unwrap();

        prop_assert_eq!(result, page);
        prop_assert_eq!(engine.calls(), vec![Call::Retrieve(anchor, limit)]);
    }

    #[test]
    fn only_last_notifier_fires(registrations in 1usize..6, events in 0usize..6) {
        let (engine, capture) = service();
        let counts: Vec<Arc<AtomicUsize>> =
            (0..registrations).map(|_| Arc::new(AtomicUsize::new(0))).collect();

        for count in &counts {
            let c = Arc::clone(count);
            capture.set_notifier(Some(Arc::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            })));
        }
        for _ in 0..events {
            engine.emit(LOCATION_RECEIVED);
        }

        let (last, earlier) = counts.split_last().unwrap();
        prop_assert_eq!(last.load(Ordering::SeqCst), events);
        for count in earlier {
            prop_assert_eq!(count.load(Ordering::SeqCst), 0);
        }
    }

    #[test]
    fn paging_visits_every_record_once(
        latitudes in prop::collection::vec(-90.0f64..=90.0, 0..30),
        page_size in 1u32..8,
    ) {
        let storage = CaptureStorage::in_memory().unwrap();
        for (i, lat) in latitudes.iter().enumerate() {
            let ts = i64::try_from(i).unwrap();
            storage.add_location(&CapturedLocation::new(ts, *lat, 0.0, 5.0)).unwrap();
        }

        let mut seen = Vec::new();
        let mut anchor = None;
        loop {
            let page = storage.retrieve(anchor.as_ref(), Some(page_size)).unwrap();
            prop_assert!(page.len() <= page_size as usize);
            if page.is_empty() {
                break;
            }
            anchor = Some(page.next_anchor.clone());
            seen.extend(page.into_iter().map(|fix| fix.latitude));
        }

        prop_assert_eq!(seen, latitudes);
    }
}
