use miette::Diagnostic;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DiscordError>;

#[derive(Error, Diagnostic, Debug)]
pub enum DiscordError {
    #[error("Discord API error: {0}")]
    #[diagnostic(
        code(parley_discord::api),
        help("Check the bot token, its intents and its permissions in the server")
    )]
    Api(#[from] serenity::Error),

    #[error("Invalid Discord id '{0}'")]
    #[diagnostic(code(parley_discord::invalid_id))]
    InvalidId(String),

    #[error("The bot has not received its identity from the gateway yet")]
    #[diagnostic(code(parley_discord::not_ready))]
    NotReady,
}
