/*
Wires the compartments together for a live run

Each compartment only ever sees the broker and the tokens the manifest gave it

The delivery loop runs next to them as its own task
*/
use cfgbroker::core::delivery;
use cfgbroker::{CompartmentTokens, Direction, SealedToken, SharedBroker, Validator};
use thiserror::Error;
use tokio::sync::watch::Receiver;
use tokio::task::JoinHandle;
use tracing::info;

use crate::compartments::config_source::{Feed, SourceTiming};
use crate::compartments::subscriber::Subscriber;
use crate::compartments::{bad_dog, config_source, subscriber};
use crate::config::DemoConfig;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("compartment {compartment} has no {direction} capability for {item}")]
    MissingCapability {
        compartment: String,
        direction: Direction,
        item: String,
    },

    #[error("manifest declares no compartments besides {0}")]
    NoSubscribers(String),
}

pub struct Running {
    pub subscribers: Vec<Subscriber>,
    pub handles: Vec<JoinHandle<()>>,
}

pub fn run(
    broker: SharedBroker,
    mut tokens: CompartmentTokens,
    demo: &DemoConfig,
    shutdown_rx: Receiver<()>,
) -> Result<Running, RuntimeError> {
    let source = demo.source_compartment.as_str();

    // hand out every capability before anything starts
    let mut feeds = Vec::with_capacity(demo.feeds.len());
    for feed in &demo.feeds {
        let capability = tokens
            .take(source, Direction::Write, &feed.item)
            .ok_or_else(|| missing_write(source, &feed.item))?;
        feeds.push(Feed {
            item: feed.item.clone(),
            token_text: feed.token.clone(),
            capability,
        });
    }

    // bad dog borrows the source's write capability for its item
    let bad_feed = match &demo.bad_dog_item {
        Some(item) => {
            let capability = feeds
                .iter()
                .find(|feed| &feed.item == item)
                .map(|feed| feed.capability.clone())
                .ok_or_else(|| missing_write(source, item))?;
            Some((item.clone(), capability))
        }
        None => None,
    };

    // every other compartment subscribes, with read capabilities only
    let names: Vec<String> = tokens
        .compartments()
        .into_iter()
        .filter(|name| *name != source)
        .map(str::to_string)
        .collect();
    if names.is_empty() {
        return Err(RuntimeError::NoSubscribers(source.to_string()));
    }
    let readers: Vec<(String, Vec<SealedToken>)> = names
        .into_iter()
        .map(|name| {
            let capabilities = tokens
                .take_all(&name)
                .into_iter()
                .filter(|(direction, _, _)| *direction == Direction::Read)
                .map(|(_, _, token)| token)
                .collect();
            (name, capabilities)
        })
        .collect();

    let mut handles = Vec::new();

    // 1. Delivery loop
    handles.push(delivery::spawn(broker.clone(), shutdown_rx.clone()));

    // 2. Subscribers
    let validator = Validator::from_config(broker.config());
    let mut subscribers = Vec::with_capacity(readers.len());
    for (name, capabilities) in readers {
        info!(compartment = %name, capabilities = capabilities.len(), "starting subscriber");
        let sub = Subscriber::new(name, validator.clone());
        subscribers.push(sub.clone());
        handles.push(tokio::spawn(subscriber::run(
            sub,
            broker.clone(),
            capabilities,
            demo.display_interval(),
            shutdown_rx.clone(),
        )));
    }

    // 3. Bad dog
    if let Some((item, capability)) = bad_feed {
        handles.push(tokio::spawn(bad_dog::run(
            broker.clone(),
            item,
            capability,
            demo.bad_publish_interval(),
            shutdown_rx.clone(),
        )));
    }

    // 4. Config source
    handles.push(tokio::spawn(config_source::run(
        broker,
        feeds,
        SourceTiming {
            publish_interval: demo.publish_interval(),
            settle_interval: demo.settle_interval(),
        },
        shutdown_rx,
    )));

    Ok(Running { subscribers, handles })
}

fn missing_write(compartment: &str, item: &str) -> RuntimeError {
    RuntimeError::MissingCapability {
        compartment: compartment.to_string(),
        direction: Direction::Write,
        item: item.to_string(),
    }
}
