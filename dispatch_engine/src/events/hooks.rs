use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{EventHandler, EventProducer, Handler, Notification};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub notification_producer: Vec<EventProducer<Notification>>,
}

impl EventProducers {
    pub fn is_empty(&self) -> bool {
        self.notification_producer.is_empty()
    }
}

pub struct EventHandlers {
    pub on_notification: Option<EventHandler<Notification>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_notification = hooks.on_notification.map(|f| EventHandler::new(buffer_size, f));
        Self { on_notification }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_notification {
            result.notification_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_notification {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_notification: Option<Handler<Notification>>,
}

impl EventHooks {
    pub fn on_notification<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(Notification) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_notification = Some(Arc::new(f));
        self
    }
}
