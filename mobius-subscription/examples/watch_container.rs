//! Watch a Mobius container and print every new content instance.
//!
//! ```text
//! cargo run -p mobius-subscription --example watch_container -- <host> <ae> <container>
//! ```
//!
//! Press Ctrl-C to stop; the subscription resource is deleted before the
//! process exits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::time::Duration;

use mobius_subscription::logging::init_logging_from_env;
use mobius_subscription::prelude::*;

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    init_logging_from_env()?;

    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "127.0.0.1".to_string());
    let application = args.next().unwrap_or_else(|| "SubTest".to_string());
    let container = args.next().unwrap_or_else(|| "testcnt1".to_string());

    let config = SubscriptionConfig::builder(host, application, container)
        .identity("UbicompSub")
        .build()?;

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))?;
    }

    let subscription = MobiusSubscription::new(config);
    let notifications = subscription.start_streaming()?;

    println!("Watching {} (Ctrl-C to stop)", subscription.config().base_url());

    while running.load(Ordering::SeqCst) {
        let notification = match notifications.wait(Duration::from_millis(250)) {
            Ok(notification) => notification,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                eprintln!("listener exited");
                break;
            }
        };

        if notification.envelope.verification_request {
            continue;
        }

        match notification.envelope.content {
            Some(content) => println!("{} -> {}", notification.topic, content),
            None => println!("{} -> <no content>", notification.topic),
        }
    }

    // Dropping would do the same; stopping explicitly lets us show the outcome
    if let Some(report) = subscription.stop()? {
        println!("listener: {:?}", report.listener);
        if let Err(e) = report.deregistration {
            eprintln!("subscription not removed: {}", e);
        }
    }

    Ok(())
}
