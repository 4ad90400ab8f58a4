//! Telegram worker adapter built on teloxide long polling.

use async_trait::async_trait;
use std::sync::Arc;
use teloxide::dptree;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use teloxide::utils::command::BotCommands;
use tokio_util::sync::CancellationToken;

use super::worker::{BotWorker, WorkerError, WorkerFactory};
use crate::models::Bot as BotRecord;

/// Commands every managed bot answers out of the box.
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
enum Command {
    #[command(description = "greet the user")]
    Start,
    #[command(description = "show available commands")]
    Help,
    #[command(description = "report bot status")]
    Status,
}

/// Identity of the managed bot, injected into the handler tree.
#[derive(Clone)]
struct BotIdentity {
    id: i64,
    name: String,
}

pub struct TelegramWorker {
    bot_id: i64,
    name: String,
    token: String,
}

#[async_trait]
impl BotWorker for TelegramWorker {
    async fn run(&self, cancel: CancellationToken) -> Result<(), WorkerError> {
        let bot = Bot::new(self.token.clone());

        // Fail fast on a bad token before entering the polling loop
        let me = bot
            .get_me()
            .await
            .map_err(|e| WorkerError::Connect(e.to_string()))?;
        log::info!(
            "Bot {} ({}) connected to Telegram as @{}",
            self.bot_id,
            self.name,
            me.username()
        );

        let handler = Update::filter_message()
            .branch(
                dptree::entry()
                    .filter_command::<Command>()
                    .endpoint(handle_command),
            )
            .branch(dptree::endpoint(echo));

        let mut dispatcher = Dispatcher::builder(bot, handler)
            .dependencies(dptree::deps![BotIdentity {
                id: self.bot_id,
                name: self.name.clone(),
            }])
            .default_handler(|_| async {})
            .build();

        tokio::select! {
            _ = cancel.cancelled() => {
                log::info!("Bot {} ({}) polling cancelled", self.bot_id, self.name);
                Ok(())
            }
            _ = dispatcher.dispatch() => Err(WorkerError::Terminated),
        }
    }

    async fn shutdown(&self) {
        // The teloxide client and its HTTP session are dropped with the
        // dispatcher at the end of run()
        log::debug!("Bot {} ({}) session released", self.bot_id, self.name);
    }
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    identity: BotIdentity,
) -> ResponseResult<()> {
    match cmd {
        Command::Start => {
            bot.send_message(
                msg.chat.id,
                format!(
                    "Hello! I am {}.\nUse /help to see available commands.",
                    identity.name
                ),
            )
            .await?;
        }
        Command::Help => {
            bot.send_message(
                msg.chat.id,
                format!("<b>{} commands:</b>\n\n{}", identity.name, Command::descriptions()),
            )
            .parse_mode(ParseMode::Html)
            .await?;
        }
        Command::Status => {
            bot.send_message(
                msg.chat.id,
                format!(
                    "<b>{}</b> is running.\nBot ID: {}",
                    identity.name, identity.id
                ),
            )
            .parse_mode(ParseMode::Html)
            .await?;
        }
    }
    Ok(())
}

async fn echo(bot: Bot, msg: Message) -> ResponseResult<()> {
    if let Some(text) = msg.text() {
        bot.send_message(
            msg.chat.id,
            format!("You said: {}\n\nUse /help to see available commands.", text),
        )
        .await?;
    }
    Ok(())
}

pub struct TelegramWorkerFactory;

impl WorkerFactory for TelegramWorkerFactory {
    fn build(&self, bot: &BotRecord) -> Result<Arc<dyn BotWorker>, WorkerError> {
        let token = bot.token.trim();
        if token.is_empty() {
            return Err(WorkerError::Build(format!(
                "bot {} has an empty token",
                bot.id
            )));
        }

        Ok(Arc::new(TelegramWorker {
            bot_id: bot.id,
            name: bot.name.clone(),
            token: token.to_string(),
        }))
    }
}
