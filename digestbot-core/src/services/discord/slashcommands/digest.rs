// File: digestbot-core/src/services/discord/slashcommands/digest.rs

use std::sync::Arc;

use async_trait::async_trait;
use twilight_http::Client as HttpClient;
use twilight_model::application::command::CommandType;
use twilight_model::application::interaction::application_command::{CommandData, CommandOptionValue};
use twilight_model::application::interaction::Interaction;
use twilight_model::channel::message::MessageFlags;
use twilight_model::id::marker::ApplicationMarker;
use twilight_model::id::Id;
use twilight_util::builder::command::{BooleanBuilder, CommandBuilder, StringBuilder};

use digestbot_common::models::message::{ChannelRef, Requester};

use crate::platforms::discord::display_name;
use crate::platforms::discord::notify::reply_embed;
use crate::platforms::{CommandReply, Reply};
use crate::services::digest_service::{DigestInvocation, DEFAULT_PERIOD};
use crate::Error;

pub const COMMAND_NAME: &str = "digest";

/// Create a CommandBuilder for `/digest [period] [public]`.
pub fn create_digest_command() -> CommandBuilder {
    CommandBuilder::new(
        COMMAND_NAME,
        "Summarise recent messages in this channel",
        CommandType::ChatInput,
    )
    .option(
        StringBuilder::new("period", "How far back to look, e.g. 24h or 7d (default 24h)")
            .required(false),
    )
    .option(
        BooleanBuilder::new("public", "Show the summary to everyone in the channel (default: only you)")
            .required(false),
    )
    .dm_permission(false)
}

/// Pulls the channel, requester and options out of a `/digest` interaction.
pub fn parse_digest_invocation(interaction: &Interaction, data: &CommandData) -> Result<DigestInvocation, Error> {
    let author = interaction
        .author()
        .ok_or_else(|| Error::Platform("Interaction without a user".to_string()))?;

    let requester = Requester {
        id: author.id.get(),
        name: author.name.clone(),
        display_name: display_name(author, interaction.member.as_ref()),
    };

    let channel = interaction.channel.as_ref().map(|c| ChannelRef {
        id: c.id.get(),
        name: c.name.clone().unwrap_or_else(|| c.id.to_string()),
    });

    let mut period = DEFAULT_PERIOD.to_string();
    let mut public = false;
    for option in &data.options {
        match (option.name.as_str(), &option.value) {
            ("period", CommandOptionValue::String(value)) => period = value.clone(),
            ("public", CommandOptionValue::Boolean(value)) => public = *value,
            _ => {}
        }
    }

    Ok(DigestInvocation { channel, requester, period, public })
}

/// Sends replies as followups to a deferred interaction.
pub struct InteractionReply {
    http: Arc<HttpClient>,
    application_id: Id<ApplicationMarker>,
    token: String,
}

impl InteractionReply {
    pub fn new(http: Arc<HttpClient>, application_id: Id<ApplicationMarker>, token: impl Into<String>) -> Self {
        Self { http, application_id, token: token.into() }
    }
}

#[async_trait]
impl CommandReply for InteractionReply {
    async fn send_reply(&self, reply: Reply) -> Result<(), Error> {
        let embeds = [reply_embed(&reply)];
        let client = self.http.interaction(self.application_id);
        let mut followup = client.create_followup(&self.token).embeds(&embeds);
        if reply.ephemeral {
            followup = followup.flags(MessageFlags::EPHEMERAL);
        }
        followup
            .await
            .map_err(|e| Error::Platform(format!("Error responding to `/digest`: {e}")))?;
        Ok(())
    }
}
