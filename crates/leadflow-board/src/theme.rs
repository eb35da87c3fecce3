use leadflow_core::{LeadStatus, Temperature};
use ratatui::style::{Color, Modifier, Style};

pub const HEADER_STYLE: Style = Style::new()
    .fg(Color::Rgb(142, 192, 124))
    .add_modifier(Modifier::BOLD);
pub const SELECTED_STYLE: Style = Style::new()
    .bg(Color::Rgb(131, 165, 152))
    .fg(Color::Black)
    .add_modifier(Modifier::BOLD);
pub const DRAG_STYLE: Style = Style::new()
    .bg(Color::Rgb(250, 189, 47))
    .fg(Color::Black)
    .add_modifier(Modifier::BOLD);
pub const ERROR_STYLE: Style = Style::new()
    .bg(Color::Rgb(204, 36, 29))
    .fg(Color::Rgb(251, 241, 199))
    .add_modifier(Modifier::BOLD);
pub const DIM_STYLE: Style = Style::new().fg(Color::Rgb(146, 131, 116));

pub fn zebra_row_style(index: usize) -> Style {
    let bg = if index % 2 == 0 {
        Color::Rgb(18, 20, 26)
    } else {
        Color::Rgb(24, 27, 34)
    };
    Style::new().bg(bg)
}

pub mod icons {
    pub const HOT: &str = "*";
    pub const WARM: &str = "~";
    pub const COLD: &str = "-";
    pub const LOADING: &str = "...";
    pub const DROP: &str = ">";
}

pub fn status_color(status: LeadStatus) -> Color {
    match status {
        LeadStatus::New => Color::Rgb(146, 131, 116),
        LeadStatus::InitialContact => Color::Rgb(131, 165, 152),
        LeadStatus::Qualifying => Color::Rgb(69, 133, 136),
        LeadStatus::Qualified => Color::Rgb(211, 134, 155),
        LeadStatus::MeetingScheduled => Color::Rgb(250, 189, 47),
        LeadStatus::Won => Color::Rgb(184, 187, 38),
        LeadStatus::Lost => Color::Rgb(214, 93, 14),
    }
}

pub fn temperature_color(temperature: Temperature) -> Color {
    match temperature {
        Temperature::Hot => Color::Rgb(254, 128, 25),
        Temperature::Warm => Color::Rgb(250, 189, 47),
        Temperature::Cold => Color::Rgb(131, 165, 152),
    }
}

pub fn temperature_icon(temperature: Temperature) -> &'static str {
    match temperature {
        Temperature::Hot => icons::HOT,
        Temperature::Warm => icons::WARM,
        Temperature::Cold => icons::COLD,
    }
}
