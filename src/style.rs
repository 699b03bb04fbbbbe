use std::fmt;
use std::str::FromStr;

use rust_xlsxwriter::{Color, Format, FormatBorder};
use serde::{Deserialize, Serialize};

use crate::error::RenderError;

pub const INTEGER_FORMAT: &str = "#,##0";
pub const FLOAT_FORMAT: &str = "#,##0.00";
pub const CURRENCY_FORMAT: &str = "R$ #,##0.00";
pub const DATE_FORMAT: &str = "yyyy-mm-dd";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Theme {
    Blue,
    Green,
    Gray,
    Orange,
}

impl Theme {
    pub const ALL: [Theme; 4] = [Theme::Blue, Theme::Green, Theme::Gray, Theme::Orange];

    pub fn name(self) -> &'static str {
        match self {
            Theme::Blue => "Blue",
            Theme::Green => "Green",
            Theme::Gray => "Gray",
            Theme::Orange => "Orange",
        }
    }

    pub fn palette(self) -> &'static Palette {
        match self {
            Theme::Blue => &BLUE,
            Theme::Green => &GREEN,
            Theme::Gray => &GRAY,
            Theme::Orange => &ORANGE,
        }
    }
}

impl FromStr for Theme {
    type Err = RenderError;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        match key.trim().to_lowercase().as_str() {
            "blue" | "azul" => Ok(Theme::Blue),
            "green" | "verde" => Ok(Theme::Green),
            "gray" | "grey" | "cinza" => Ok(Theme::Gray),
            "orange" | "laranja" => Ok(Theme::Orange),
            _ => Err(RenderError::UnknownTheme(key.to_string())),
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Six-digit RGB hex strings, no leading `#`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    pub header_bg: &'static str,
    pub kpi_bg: &'static str,
    pub zebra: &'static str,
    pub negative_highlight: &'static str,
    pub positive_highlight: &'static str,
    pub scale_min: &'static str,
    pub scale_max: &'static str,
}

static BLUE: Palette = Palette {
    header_bg: "E8F1FF",
    kpi_bg: "DCEBFF",
    zebra: "F7FAFF",
    negative_highlight: "FCE8E6",
    positive_highlight: "E6F4EA",
    scale_min: "E8F1FF",
    scale_max: "2B6CB0",
};

static GREEN: Palette = Palette {
    header_bg: "E9F7EF",
    kpi_bg: "D4EFDF",
    zebra: "F5FBF7",
    negative_highlight: "FDEDEC",
    positive_highlight: "E8F8F5",
    scale_min: "E9F7EF",
    scale_max: "1E8449",
};

static GRAY: Palette = Palette {
    header_bg: "F0F0F0",
    kpi_bg: "E6E6E6",
    zebra: "FAFAFA",
    negative_highlight: "FDEDEC",
    positive_highlight: "EBF5FB",
    scale_min: "F0F0F0",
    scale_max: "5D6D7E",
};

static ORANGE: Palette = Palette {
    header_bg: "FFF1E6",
    kpi_bg: "FFE0CC",
    zebra: "FFF9F3",
    negative_highlight: "FDECEA",
    positive_highlight: "FFF7E6",
    scale_min: "FFF1E6",
    scale_max: "D35400",
};

pub fn hex_color(hex: &str) -> Color {
    // palette entries are compile-time constants
    Color::RGB(u32::from_str_radix(hex, 16).unwrap_or(0))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatKind {
    #[default]
    Text,
    Integer,
    Float,
    Currency,
    Date,
}

impl FormatKind {
    /// Lenient lookup used by the document loader; `None` for unknown names.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "text" | "string" => Some(FormatKind::Text),
            "int" | "integer" => Some(FormatKind::Integer),
            "float" | "number" => Some(FormatKind::Float),
            "currency" | "money" => Some(FormatKind::Currency),
            "date" => Some(FormatKind::Date),
            _ => None,
        }
    }

    pub fn role(self) -> FormatRole {
        match self {
            FormatKind::Text => FormatRole::Text,
            FormatKind::Integer => FormatRole::Integer,
            FormatKind::Float => FormatRole::Float,
            FormatKind::Currency => FormatRole::Currency,
            FormatKind::Date => FormatRole::Date,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            FormatKind::Integer | FormatKind::Float | FormatKind::Currency
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatRole {
    Text,
    Integer,
    Float,
    Currency,
    Date,
    Header,
    KpiLabel,
    KpiValue,
    KpiCurrency,
}

impl FormatRole {
    pub const ALL: [FormatRole; 9] = [
        FormatRole::Text,
        FormatRole::Integer,
        FormatRole::Float,
        FormatRole::Currency,
        FormatRole::Date,
        FormatRole::Header,
        FormatRole::KpiLabel,
        FormatRole::KpiValue,
        FormatRole::KpiCurrency,
    ];
}

/// Cell formats for one render, bound to a single theme.
#[derive(Debug, Clone)]
pub struct FormatRegistry {
    theme: Theme,
    text: Format,
    integer: Format,
    float: Format,
    currency: Format,
    date: Format,
    header: Format,
    kpi_label: Format,
    kpi_value: Format,
    kpi_currency: Format,
    zebra: Format,
    negative: Format,
}

impl FormatRegistry {
    pub fn new(theme: Theme) -> Self {
        let palette = theme.palette();
        let kpi_value = Format::new()
            .set_bold()
            .set_background_color(hex_color(palette.kpi_bg))
            .set_border(FormatBorder::Thin);

        FormatRegistry {
            theme,
            text: Format::new(),
            integer: Format::new().set_num_format(INTEGER_FORMAT),
            float: Format::new().set_num_format(FLOAT_FORMAT),
            currency: Format::new().set_num_format(CURRENCY_FORMAT),
            date: Format::new().set_num_format(DATE_FORMAT),
            header: Format::new()
                .set_bold()
                .set_background_color(hex_color(palette.header_bg))
                .set_border(FormatBorder::Thin),
            kpi_label: Format::new().set_bold(),
            kpi_currency: kpi_value.clone().set_num_format(CURRENCY_FORMAT),
            kpi_value: kpi_value.set_num_format(FLOAT_FORMAT),
            zebra: Format::new().set_background_color(hex_color(palette.zebra)),
            negative: Format::new().set_background_color(hex_color(palette.negative_highlight)),
        }
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn palette(&self) -> &'static Palette {
        self.theme.palette()
    }

    pub fn get(&self, role: FormatRole) -> &Format {
        match role {
            FormatRole::Text => &self.text,
            FormatRole::Integer => &self.integer,
            FormatRole::Float => &self.float,
            FormatRole::Currency => &self.currency,
            FormatRole::Date => &self.date,
            FormatRole::Header => &self.header,
            FormatRole::KpiLabel => &self.kpi_label,
            FormatRole::KpiValue => &self.kpi_value,
            FormatRole::KpiCurrency => &self.kpi_currency,
        }
    }

    pub fn for_kind(&self, kind: FormatKind) -> &Format {
        self.get(kind.role())
    }

    pub fn zebra_fill(&self) -> &Format {
        &self.zebra
    }

    pub fn negative_fill(&self) -> &Format {
        &self.negative
    }

    pub fn data_bar_color(&self) -> Color {
        hex_color(self.palette().scale_max)
    }
}
