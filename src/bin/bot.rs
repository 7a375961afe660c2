use anyhow::Result;
use dotenvy::dotenv;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;

use recordatorio::commands::CommandContext;
use recordatorio::core::{Config, SystemClock};
use recordatorio::features::delivery::{
    DeliveryRouter, EmailSender, ReminderSender, TelegramSender,
};
use recordatorio::features::parser::TemporalParser;
use recordatorio::features::rate_limiting::RateLimiter;
use recordatorio::features::reminders::ReminderScheduler;
use recordatorio::storage::{Database, ReminderStore};
use recordatorio::telegram::TelegramClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = Config::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    info!("🚀 Starting Recordatorio bot...");

    let database = Database::new(&config.database_path).await?;
    let store: Arc<dyn ReminderStore> = Arc::new(database);

    let telegram = TelegramClient::new(&config.telegram_token)?;

    // Email is optional; a broken SMTP config disables the channel instead
    // of taking the bot down
    let email_sender: Option<Arc<dyn ReminderSender>> = match &config.smtp {
        Some(smtp) => match EmailSender::new(smtp) {
            Ok(sender) => {
                info!("📧 Email channel enabled via {}", smtp.host);
                Some(Arc::new(sender))
            }
            Err(e) => {
                warn!("📧 Email channel disabled: {e:#}");
                None
            }
        },
        None => None,
    };

    let router = DeliveryRouter::new(
        Arc::new(TelegramSender::new(telegram.clone())),
        email_sender,
    );

    let clock = Arc::new(SystemClock);

    // Start the reminder dispatch loop
    let scheduler = Arc::new(ReminderScheduler::new(
        store.clone(),
        router,
        clock.clone(),
        Duration::from_secs(config.check_interval_secs),
    ));
    let scheduler_task = scheduler.start();
    info!(
        "⏰ Reminder dispatch configured (every {}s)",
        config.check_interval_secs
    );

    let context = CommandContext {
        store,
        parser: TemporalParser::new(),
        telegram: telegram.clone(),
        rate_limiter: RateLimiter::new(
            config.rate_limit_max,
            Duration::from_secs(config.rate_limit_window_secs),
        ),
        timezone: config.timezone,
        clock,
    };

    info!("✅ Bot started. Waiting for messages...");

    let mut offset = 0i64;
    loop {
        tokio::select! {
            result = telegram.get_updates(offset) => {
                match result {
                    Ok(updates) => {
                        for update in updates {
                            offset = offset.max(update.update_id + 1);
                            if let Err(e) = context.handle_update(&update).await {
                                error!("Error handling update {}: {e:#}", update.update_id);
                                if let Some(chat_id) = update.message.as_ref().map(|m| m.chat.id) {
                                    if let Err(why) = telegram
                                        .send_message(
                                            chat_id,
                                            "❌ Ocurrió un error procesando tu mensaje.",
                                        )
                                        .await
                                    {
                                        error!("Failed to send error message: {why:#}");
                                    }
                                }
                            }
                        }
                    }
                    Err(e) => {
                        error!("❌ getUpdates failed: {e:#}");
                        // Telegram hiccup or network outage; back off briefly
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("🛑 Shutdown signal received");
                break;
            }
        }
    }

    // Let an in-flight tick finish before exiting
    scheduler.stop();
    let _ = scheduler_task.await;
    info!("👋 Bot stopped");

    Ok(())
}
