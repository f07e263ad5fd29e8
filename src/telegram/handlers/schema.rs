use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;

use crate::telegram::Command;

use super::types::HandlerError;
use super::{callbacks, commands, messages};

/// The dptree update routing schema.
pub fn schema() -> UpdateHandler<HandlerError> {
    let command_handler = teloxide::filter_command::<Command, _>()
        .branch(dptree::case![Command::Start(payload)].endpoint(commands::handle_start))
        .branch(dptree::case![Command::Help].endpoint(commands::handle_help));

    let message_handler = Update::filter_message()
        .branch(command_handler)
        .endpoint(messages::handle_message);

    let callback_handler = Update::filter_callback_query().endpoint(callbacks::handle_callback);

    dptree::entry()
        .branch(message_handler)
        .branch(callback_handler)
}
