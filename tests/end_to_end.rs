mod common;

use std::sync::{Arc, Mutex};

use cfgbroker::{
    BrokerConfig, CapabilityManifest, ClaimSlot, ConfigBroker, ConfigValue, ContentCheck, Direction, Validator, Verdict,
};
use cfgbroker_protocol::{is_valid_record, ConfigRecord};
use crate::common::{assert_quiet, init_tracing, next_call, recorder, start_delivery};

const MANIFEST: &str = r#"
[[capability]]
compartment = "config_source"
direction = "write"
item = "config1"
max_size = 43

[[capability]]
compartment = "subscriber1"
direction = "read"
item = "config1"
"#;

#[tokio::test]
async fn wile_e_reaches_late_subscriber_then_next_update_once() {
    init_tracing();
    let manifest = CapabilityManifest::from_toml_str(MANIFEST).unwrap();
    let (broker, mut tokens) = ConfigBroker::boot(BrokerConfig::default(), &manifest).unwrap();
    let write = tokens.take("config_source", Direction::Write, "config1").unwrap();
    let read = tokens.take("subscriber1", Direction::Read, "config1").unwrap();
    let delivery = start_delivery(&broker);

    let first = ConfigRecord::new(0, "Wile-E").serialize();
    broker.publish(&write, &first, first.len()).await.unwrap();

    let (callback, mut rx) = recorder();
    broker.subscribe(&read, callback).await;

    let (item, bytes) = rx.try_recv().expect("current value delivered during subscribe");
    assert_eq!(item, "config1");
    assert_eq!(ConfigRecord::deserialize(&bytes).unwrap(), ConfigRecord::new(0, "Wile-E"));
    assert_quiet(&mut rx).await;

    let second = ConfigRecord::new(1, "Wile-E").serialize();
    broker.publish(&write, &second, second.len()).await.unwrap();

    let (_, bytes) = next_call(&mut rx).await;
    assert_eq!(ConfigRecord::deserialize(&bytes).unwrap().count, 1);
    assert_quiet(&mut rx).await;

    delivery.stop().await;
}

// trusts the encoded token length and indexes without checking it
fn trusting_record_check(data: &[u8]) -> bool {
    let token_len = u16::from_be_bytes([data[5], data[6]]) as usize;
    let _last = data[6 + token_len];
    is_valid_record(data)
}

async fn held_after_bad_publish(check: ContentCheck, bad: &[u8]) -> (Vec<Verdict>, Option<ConfigRecord>) {
    init_tracing();
    let manifest = CapabilityManifest::from_toml_str(MANIFEST).unwrap();
    let (broker, mut tokens) = ConfigBroker::boot(BrokerConfig::default(), &manifest).unwrap();
    let write = tokens.take("config_source", Direction::Write, "config1").unwrap();
    let read = tokens.take("subscriber1", Direction::Read, "config1").unwrap();
    let delivery = start_delivery(&broker);

    let slot = Arc::new(Mutex::new(ClaimSlot::new()));
    let verdicts = Arc::new(Mutex::new(Vec::new()));
    let validator = Validator::from_config(broker.config());
    {
        let slot = Arc::clone(&slot);
        let verdicts = Arc::clone(&verdicts);
        broker
            .subscribe(&read, move |_: &str, value: &ConfigValue| {
                let verdict = validator.validate(value, check);
                verdicts.lock().unwrap().push(verdict);
                if verdict.is_accepted() {
                    slot.lock().unwrap().adopt(value);
                }
            })
            .await;
    }

    let good = ConfigRecord::new(5, "Wile-E").serialize();
    broker.publish(&write, &good, good.len()).await.unwrap();
    wait_for_verdicts(&verdicts, 1).await;

    broker.publish(&write, bad, bad.len()).await.unwrap();
    wait_for_verdicts(&verdicts, 2).await;
    delivery.stop().await;

    let held = slot
        .lock()
        .unwrap()
        .current()
        .map(|claim| ConfigRecord::deserialize(claim).unwrap());
    let verdicts = verdicts.lock().unwrap().clone();
    (verdicts, held)
}

#[tokio::test]
async fn rejected_content_keeps_previous_claim() {
    let (verdicts, held) = held_after_bad_publish(is_valid_record, &[0xde, 0xad, 0xbe, 0xef]).await;

    assert_eq!(verdicts, vec![Verdict::Valid, Verdict::Invalid]);
    assert_eq!(held, Some(ConfigRecord::new(5, "Wile-E")));
}

#[tokio::test]
async fn trapped_check_keeps_previous_claim() {
    // claims a 200 byte token in an 8 byte payload
    let crafted = [1, 0, 0, 0, 0, 0, 200, b'x'];
    let (verdicts, held) = held_after_bad_publish(trusting_record_check, &crafted).await;

    assert_eq!(verdicts, vec![Verdict::Valid, Verdict::Trapped]);
    assert_eq!(held, Some(ConfigRecord::new(5, "Wile-E")));
}

async fn wait_for_verdicts(verdicts: &Arc<Mutex<Vec<Verdict>>>, n: usize) {
    tokio::time::timeout(common::WAIT, async {
        while verdicts.lock().unwrap().len() < n {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("validation finished in time");
}
