// File: digestbot-core/src/services/discord/slashcommands/mod.rs

pub mod digest;

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error};
use twilight_http::Client as HttpClient;
use twilight_model::{
    application::interaction::InteractionData,
    channel::message::MessageFlags,
    gateway::payload::incoming::InteractionCreate,
    http::interaction::{InteractionResponse, InteractionResponseData, InteractionResponseType},
    id::marker::ApplicationMarker,
    id::Id,
};

use crate::services::digest_service::DigestCommandService;
use crate::services::discord::slashcommands::digest::{
    create_digest_command, parse_digest_invocation, InteractionReply, COMMAND_NAME,
};
use crate::Error;

pub async fn register_global_slash_commands(
    http: &Arc<HttpClient>,
    application_id: Id<ApplicationMarker>,
) -> Result<(), Error> {
    let commands = &[create_digest_command().build()];

    http.interaction(application_id)
        .set_global_commands(commands)
        .await
        .map_err(|e| Error::Platform(format!("Failed to register global slash commands: {e}")))?;

    Ok(())
}

/// Defers the interaction right away, then handles the command on its own
/// task so the shard loop keeps draining events.
pub async fn handle_interaction_create(
    http: Arc<HttpClient>,
    application_id: Id<ApplicationMarker>,
    digest: Arc<DigestCommandService>,
    event: &InteractionCreate,
) -> Result<(), Error> {
    let interaction = &event.0;

    let Some(InteractionData::ApplicationCommand(cmd_data)) = &interaction.data else {
        return Ok(());
    };

    if cmd_data.name != COMMAND_NAME {
        http.interaction(application_id)
            .create_response(
                interaction.id,
                &interaction.token,
                &InteractionResponse {
                    kind: InteractionResponseType::ChannelMessageWithSource,
                    data: Some(InteractionResponseData {
                        content: Some(format!("Unrecognized command: {}", cmd_data.name)),
                        flags: Some(MessageFlags::EPHEMERAL),
                        ..Default::default()
                    }),
                },
            )
            .await
            .ok(); // ignore error
        return Ok(());
    }

    let invocation = parse_digest_invocation(interaction, cmd_data)?;
    debug!(
        "Received /digest from {} ({}) period={} public={}",
        invocation.requester.name, invocation.requester.id, invocation.period, invocation.public
    );

    let defer = InteractionResponse {
        kind: InteractionResponseType::DeferredChannelMessageWithSource,
        data: (!invocation.public).then(|| InteractionResponseData {
            flags: Some(MessageFlags::EPHEMERAL),
            ..Default::default()
        }),
    };
    http.interaction(application_id)
        .create_response(interaction.id, &interaction.token, &defer)
        .await
        .map_err(|e| Error::Platform(format!("Error deferring `/digest`: {e}")))?;

    let reply = InteractionReply::new(http.clone(), application_id, interaction.token.clone());
    tokio::spawn(async move {
        if let Err(e) = digest.on_summarize_requested(invocation, &reply, Utc::now()).await {
            error!("/digest handler failed: {}", e);
        }
    });

    Ok(())
}
