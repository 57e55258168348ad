use serenity::{all::ButtonStyle, builder::{CreateActionRow, CreateButton}};

/// Custom IDs of the interactive buttons
pub mod button_ids {
    pub const CHECK_USER_ID: &str = "check_user_id";
    pub const CHECK_GUILD_ID: &str = "check_guild_id";
    pub const CHECK_MEMBERSHIP: &str = "check_membership";
}

/// Invite link plus a "done" button for users who still need to join.
pub fn join_buttons(invite_url: Option<&str>) -> Vec<CreateActionRow> {
    let mut row = Vec::new();
    if let Some(url) = invite_url {
        row.push(CreateButton::new_link(url).label("💬 Join Server"));
    }
    row.push(
        CreateButton::new(button_ids::CHECK_MEMBERSHIP)
            .label("✅ I've joined")
            .style(ButtonStyle::Success),
    );
    vec![CreateActionRow::Buttons(row)]
}

pub fn welcome_buttons(invite_url: Option<&str>) -> Vec<CreateActionRow> {
    match invite_url {
        Some(url) => vec![CreateActionRow::Buttons(vec![
            CreateButton::new_link(url).label("➕ Add to your server"),
        ])],
        None => Vec::new(),
    }
}

pub fn help_buttons() -> Vec<CreateActionRow> {
    vec![CreateActionRow::Buttons(vec![
        CreateButton::new(button_ids::CHECK_USER_ID)
            .label("🔎 My user ID")
            .style(ButtonStyle::Secondary),
        CreateButton::new(button_ids::CHECK_GUILD_ID)
            .label("🔎 Server ID")
            .style(ButtonStyle::Secondary),
    ])]
}
