use serenity::{
    all::ButtonStyle,
    builder::{CreateActionRow, CreateButton},
};

/// Custom ids of the control buttons
pub mod button_ids {
    pub const NEXT: &str = "btn-next";
    pub const PAUSE: &str = "btn-pause";
    pub const LEAVE: &str = "btn-leave";
    pub const REPEAT: &str = "btn-repeat";
    pub const LOOP: &str = "btn-loop";
    pub const MIX: &str = "btn-mix";
    pub const QUEUE: &str = "btn-queue";
    pub const CONTROLS: &str = "btn-controls";
}

fn toggle_style(enabled: bool) -> ButtonStyle {
    if enabled {
        ButtonStyle::Success
    } else {
        ButtonStyle::Secondary
    }
}

/// Two rows: transport controls, then toggles and views.
pub fn control_rows(loop_track: bool, repeat: bool) -> Vec<CreateActionRow> {
    let row1 = CreateActionRow::Buttons(vec![
        CreateButton::new(button_ids::PAUSE)
            .emoji('⏯')
            .style(ButtonStyle::Primary),
        CreateButton::new(button_ids::NEXT)
            .emoji('⏭')
            .style(ButtonStyle::Secondary),
        CreateButton::new(button_ids::LEAVE)
            .emoji('⏹')
            .style(ButtonStyle::Danger),
        CreateButton::new(button_ids::MIX)
            .emoji('🔀')
            .style(ButtonStyle::Secondary),
    ]);

    let row2 = CreateActionRow::Buttons(vec![
        CreateButton::new(button_ids::LOOP)
            .emoji('🔂')
            .style(toggle_style(loop_track)),
        CreateButton::new(button_ids::REPEAT)
            .emoji('🔁')
            .style(toggle_style(repeat)),
        CreateButton::new(button_ids::QUEUE)
            .label("Queue")
            .emoji('📋')
            .style(ButtonStyle::Secondary),
        CreateButton::new(button_ids::CONTROLS)
            .label("Controls")
            .emoji('🎛')
            .style(ButtonStyle::Secondary),
    ]);

    vec![row1, row2]
}
