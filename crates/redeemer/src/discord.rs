//! Serenity glue: posts the call-to-action, opens the invoice form, and hands
//! submissions to [`RedemptionService`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serenity::all::{
    ActionRowComponent, ButtonStyle, ChannelId, Colour, ComponentInteraction, Context,
    CreateActionRow, CreateButton, CreateEmbed, CreateEmbedFooter, CreateInputText,
    CreateInteractionResponse, CreateInteractionResponseMessage, CreateMessage, CreateModal,
    EditInteractionResponse, EditMessage, EventHandler, GetMessages, GuildId, InputTextStyle, Interaction, Message,
    ModalInteraction, Ready, RoleId, UserId,
};
use serenity::http::Http;
use tracing::{error, info, warn};

use crate::error::{PlatformError, MSG_TRY_LATER};
use crate::redemption::{AuditEntry, AuditSink, GrantContext, RedemptionService, Requester};

pub const REDEEM_BUTTON_ID: &str = "redeem_button";
pub const REDEEM_MODAL_ID: &str = "redeem_modal";
pub const INVOICE_INPUT_ID: &str = "invoice_id";

const CTA_TITLE: &str = "Get Premium Access - Redeem Your Purchase";
const CTA_URL: &str = "https://ogsware.com/";
const CTA_DESCRIPTION: &str = "\
Redeem your **Invoice ID** to instantly receive the Client Role. Unlock access to exclusive giveaways, private chat channels, and other premium features.

**Premium Client Benefits**
• **Exclusive Giveaways** - Entry to high-value prize events
• **Private Chat Access** - Join members-only discussions
• **More Features** - Enjoy ongoing client-only upgrades

**Quick & Secure Redemption**
• **Instant Assignment** - Applied right after validation
• **Simple Process** - Just enter your Invoice ID
• **Trusted System** - Secure and reliable role delivery";
const CTA_IMAGE: &str =
    "https://media.discordapp.net/attachments/1376632471260762112/1376632582149640212/G23FX56.gif";
const CTA_FOOTER: &str = "OGSWare | © 2025 Copyright. All Rights Reserved.";
const CTA_FOOTER_ICON: &str =
    "https://media.discordapp.net/attachments/1376632471260762112/1376632582590173315/IMG_3328.gif";

fn cta_embed() -> CreateEmbed {
    CreateEmbed::new()
        .title(CTA_TITLE)
        .url(CTA_URL)
        .description(CTA_DESCRIPTION)
        .colour(Colour::from_rgb(255, 255, 0))
        .image(CTA_IMAGE)
        .footer(CreateEmbedFooter::new(CTA_FOOTER).icon_url(CTA_FOOTER_ICON))
}

fn cta_components() -> Vec<CreateActionRow> {
    vec![CreateActionRow::Buttons(vec![CreateButton::new(
        REDEEM_BUTTON_ID,
    )
    .label("Redeem Invoice ID")
    .style(ButtonStyle::Secondary)])]
}

fn invoice_form() -> CreateModal {
    CreateModal::new(REDEEM_MODAL_ID, "Enter Your Invoice ID").components(vec![
        CreateActionRow::InputText(
            CreateInputText::new(InputTextStyle::Short, "SellAuth Invoice ID", INVOICE_INPUT_ID)
                .required(true),
        ),
    ])
}

fn is_call_to_action(message: &Message, bot_id: UserId) -> bool {
    message.author.id == bot_id
        && message
            .embeds
            .iter()
            .any(|embed| embed.title.as_deref() == Some(CTA_TITLE))
}

fn submitted_invoice_id(modal: &ModalInteraction) -> Option<String> {
    modal
        .data
        .components
        .iter()
        .flat_map(|row| row.components.iter())
        .find_map(|component| match component {
            ActionRowComponent::InputText(input) if input.custom_id == INVOICE_INPUT_ID => {
                input.value.clone()
            }
            _ => None,
        })
}

/// Acknowledges a submission at once; the outcome replaces it later through
/// `edit_response`, long after Discord's three-second window for a first response
fn deferred_reply() -> CreateInteractionResponse {
    CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new().ephemeral(true))
}

async fn reply_ephemeral(http: &Arc<Http>, modal: &ModalInteraction, content: &str) {
    let response = CreateInteractionResponse::Message(
        CreateInteractionResponseMessage::new()
            .content(content)
            .ephemeral(true),
    );
    if let Err(e) = modal.create_response(http, response).await {
        warn!("Could not reply to {}: {}", modal.user.id, e);
    }
}

/// One modal submission's view of the guild
pub struct DiscordGrantContext {
    http: Arc<Http>,
    interaction: ModalInteraction,
    guild_id: GuildId,
    requester: Requester,
    member_roles: Vec<RoleId>,
    deferred: bool,
}

#[async_trait]
impl GrantContext for DiscordGrantContext {
    fn requester(&self) -> &Requester {
        &self.requester
    }

    async fn role_exists(&self, role_id: u64) -> Result<bool, PlatformError> {
        let roles = self.guild_id.roles(&self.http).await?;
        Ok(roles.contains_key(&RoleId::new(role_id)))
    }

    async fn has_role(&self, role_id: u64) -> Result<bool, PlatformError> {
        Ok(self.member_roles.contains(&RoleId::new(role_id)))
    }

    async fn add_role(&self, role_id: u64) -> Result<(), PlatformError> {
        self.http
            .add_member_role(
                self.guild_id,
                UserId::new(self.requester.id),
                RoleId::new(role_id),
                Some("Invoice redeemed"),
            )
            .await?;
        Ok(())
    }

    async fn reply(&self, content: &str, ephemeral: bool) -> Result<(), PlatformError> {
        if self.deferred {
            // visibility was fixed when the response was deferred
            let edit = EditInteractionResponse::new().content(content);
            self.interaction.edit_response(&self.http, edit).await?;
            return Ok(());
        }

        let response = CreateInteractionResponse::Message(
            CreateInteractionResponseMessage::new()
                .content(content)
                .ephemeral(ephemeral),
        );
        self.interaction.create_response(&self.http, response).await?;
        Ok(())
    }
}

/// Posts audit entries to the configured log channel
pub struct ChannelAuditSink {
    http: Arc<Http>,
    channel: ChannelId,
}

impl ChannelAuditSink {
    pub fn new(http: Arc<Http>, channel: ChannelId) -> Self {
        Self { http, channel }
    }
}

#[async_trait]
impl AuditSink for ChannelAuditSink {
    async fn record(&self, entry: &AuditEntry) -> Result<(), PlatformError> {
        self.channel.say(&self.http, entry.to_string()).await?;
        Ok(())
    }
}

pub struct Handler {
    service: Arc<RedemptionService>,
    redeem_channel: ChannelId,
    announced: AtomicBool,
}

impl Handler {
    pub fn new(service: Arc<RedemptionService>, redeem_channel: ChannelId) -> Self {
        Self {
            service,
            redeem_channel,
            announced: AtomicBool::new(false),
        }
    }

    /// Edit our previous call-to-action in place if there is one, post a new one otherwise
    async fn post_call_to_action(&self, ctx: &Context, bot_id: UserId) -> serenity::Result<()> {
        let recent = self
            .redeem_channel
            .messages(&ctx.http, GetMessages::new().limit(50))
            .await?;

        match recent.iter().find(|m| is_call_to_action(m, bot_id)) {
            Some(existing) => {
                let edit = EditMessage::new()
                    .embed(cta_embed())
                    .components(cta_components());
                self.redeem_channel
                    .edit_message(&ctx.http, existing.id, edit)
                    .await?;
                info!("Refreshed redeem message {}", existing.id);
            }
            None => {
                let message = CreateMessage::new()
                    .embed(cta_embed())
                    .components(cta_components());
                let sent = self.redeem_channel.send_message(&ctx.http, message).await?;
                info!("Redeem message sent: {}", sent.id);
            }
        }
        Ok(())
    }

    async fn show_form(&self, ctx: &Context, component: &ComponentInteraction) {
        let response = CreateInteractionResponse::Modal(invoice_form());
        if let Err(e) = component.create_response(&ctx.http, response).await {
            warn!("Could not open invoice form for {}: {}", component.user.id, e);
        }
    }

    async fn submit_form(&self, ctx: &Context, modal: ModalInteraction) {
        let Some(raw_invoice_id) = submitted_invoice_id(&modal) else {
            warn!("Invoice form from {} had no invoice id", modal.user.id);
            reply_ephemeral(&ctx.http, &modal, MSG_TRY_LATER).await;
            return;
        };

        let (Some(guild_id), Some(member)) = (modal.guild_id, modal.member.as_ref()) else {
            warn!("Invoice form from {} was submitted outside a guild", modal.user.id);
            reply_ephemeral(&ctx.http, &modal, MSG_TRY_LATER).await;
            return;
        };

        let deferred = match modal.create_response(&ctx.http, deferred_reply()).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Could not defer reply to {}: {}", modal.user.id, e);
                false
            }
        };

        let member_roles = member.roles.clone();
        let requester = Requester {
            id: modal.user.id.get(),
            name: modal.user.name.clone(),
        };
        let grant_ctx = Arc::new(DiscordGrantContext {
            http: ctx.http.clone(),
            interaction: modal,
            guild_id,
            requester,
            member_roles,
            deferred,
        });

        // outcome is already logged and answered by the service
        let _ = self
            .service
            .clone()
            .handle_isolated(grant_ctx, raw_invoice_id)
            .await;
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("✅ Logged in as {}", ready.user.tag());

        // ready fires again on every reconnect
        if self.announced.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.post_call_to_action(&ctx, ready.user.id).await {
            error!("❌ Could not post redeem message to {}: {}", self.redeem_channel, e);
            self.announced.store(false, Ordering::SeqCst);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Component(component) if component.data.custom_id == REDEEM_BUTTON_ID => {
                self.show_form(&ctx, &component).await;
            }
            Interaction::Modal(modal) if modal.data.custom_id == REDEEM_MODAL_ID => {
                self.submit_form(&ctx, modal).await;
            }
            _ => {}
        }
    }
}
