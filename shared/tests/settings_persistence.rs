use crux_core::testing::AppTester;
use crux_kv::KeyValueOperation;
use shared::settings::SettingKey;
use shared::{App, Effect, Event, Model};

fn writes(effects: Vec<Effect>) -> Vec<(String, Vec<u8>)> {
    effects
        .into_iter()
        .filter_map(|e| match e {
            Effect::KeyValue(request) => match request.operation {
                KeyValueOperation::Set { key, value } => Some((key, value)),
                _ => None,
            },
            _ => None,
        })
        .collect()
}

fn key_for(raw: &str) -> SettingKey {
    [
        SettingKey::ServerUrl,
        SettingKey::DeviceLabel,
        SettingKey::Delay,
        SettingKey::InstallId,
    ]
    .into_iter()
    .find(|key| key.kv_key().map(|k| k.raw()).as_deref() == Ok(raw))
    .expect("known settings key")
}

#[test]
fn test_saved_settings_load_back_unchanged() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    app.update(
        Event::ServerUrlCommitted {
            text: "https://collector.example/ingest".into(),
        },
        &mut model,
    );
    app.update(
        Event::DeviceLabelCommitted {
            text: "Van 3".into(),
        },
        &mut model,
    );
    let update = app.update(Event::DelayCommitted { text: "25".into() }, &mut model);

    // The last commit writes the full set.
    let stored = writes(update.effects);
    assert_eq!(stored.len(), 3);

    let app = AppTester::<App, Effect>::default();
    let mut restored = Model::default();
    for (raw, value) in stored {
        app.update(
            Event::SettingLoaded {
                key: key_for(&raw),
                result: Ok(Some(value)),
            },
            &mut restored,
        );
    }

    let view = app.view(&restored);
    assert_eq!(view.server_url, "https://collector.example/ingest");
    assert_eq!(view.device_label, "Van 3");
    assert_eq!(view.delay_text, "25");
    assert_eq!(view.countdown_secs, 1500);
}

#[test]
fn test_normalized_delay_is_what_gets_stored() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    let update = app.update(Event::DelayCommitted { text: "-5".into() }, &mut model);

    let stored = writes(update.effects);
    assert!(stored.contains(&("settings:delayKey".to_string(), b"10".to_vec())));
}

#[test]
fn test_first_launch_keeps_defaults() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    for key in SettingKey::USER_SETTINGS {
        app.update(
            Event::SettingLoaded {
                key,
                result: Ok(None),
            },
            &mut model,
        );
    }

    let view = app.view(&model);
    assert_eq!(view.server_url, "http://the.link.here");
    assert_eq!(view.device_label, "My iPhone");
    assert_eq!(view.delay_text, "10");
}

#[test]
fn test_corrupt_stored_delay_is_coerced() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    app.update(
        Event::SettingLoaded {
            key: SettingKey::Delay,
            result: Ok(Some(b"9000".to_vec())),
        },
        &mut model,
    );

    assert_eq!(app.view(&model).delay_text, "60");
}
