// src/routing.rs

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::types::ReportPayload;

/// Which renderer a payload is handed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Renderer {
    LoadCurve,
    ExchangeLimits,
    MinimumGeneration,
    FlowRestriction,
    ThermalCosts,
    ThermalPlants,
    HydroPlants,
    Reservoirs,
    Inflows,
    PlantModifications,
    DeficitCosts,
    Submarkets,
    SmallPlants,
    Maintenance,
    DeckSummary,
    LineChart,
    BarChart,
    Table,
    Generic,
    NotImplemented,
}

impl Renderer {
    pub fn title(&self) -> &'static str {
        match self {
            Renderer::LoadCurve => "Load curve",
            Renderer::ExchangeLimits => "Exchange limits",
            Renderer::MinimumGeneration => "Minimum generation",
            Renderer::FlowRestriction => "Flow restrictions",
            Renderer::ThermalCosts => "Thermal costs",
            Renderer::ThermalPlants => "Thermal plants",
            Renderer::HydroPlants => "Hydro plants",
            Renderer::Reservoirs => "Reservoirs",
            Renderer::Inflows => "Inflows",
            Renderer::PlantModifications => "Plant modifications",
            Renderer::DeficitCosts => "Deficit costs",
            Renderer::Submarkets => "Submarkets",
            Renderer::SmallPlants => "Small plants",
            Renderer::Maintenance => "Maintenance schedule",
            Renderer::DeckSummary => "Deck summary",
            Renderer::LineChart => "Line chart",
            Renderer::BarChart => "Bar chart",
            Renderer::Table => "Table",
            Renderer::Generic => "Data",
            Renderer::NotImplemented => "Not implemented",
        }
    }
}

/// Case-insensitive string test. Patterns are written in lowercase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Matcher {
    Exact(&'static str),
    Contains(&'static str),
}

impl Matcher {
    pub fn matches(&self, value: &str) -> bool {
        let value = value.to_lowercase();
        match self {
            Matcher::Exact(pattern) => value == *pattern,
            Matcher::Contains(pattern) => value.contains(pattern),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rule {
    ToolName(Matcher),
    /// Checks `visualization_type`, then `chart_config.type`.
    VisualizationType(Matcher),
    HasData,
    Always,
}

impl Rule {
    pub fn matches(&self, payload: &ReportPayload) -> bool {
        match self {
            Rule::ToolName(m) => payload.tool_name.as_deref().is_some_and(|t| m.matches(t)),
            Rule::VisualizationType(m) => payload.chart_type().is_some_and(|t| m.matches(t)),
            Rule::HasData => payload.has_table() || payload.has_chart(),
            Rule::Always => true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Route {
    pub name: &'static str,
    pub rule: Rule,
    pub renderer: Renderer,
}

const fn route(name: &'static str, rule: Rule, renderer: Renderer) -> Route {
    Route {
        name,
        rule,
        renderer,
    }
}

use Matcher::{Contains, Exact};
use Renderer as R;
use Rule::{ToolName as Tool, VisualizationType as Viz};

/// Evaluated top to bottom; the first matching rule wins. Tool names come
/// first since several tools share a visualization type. The last two
/// entries always leave a renderer selected.
pub static ROUTES: Lazy<Vec<Route>> = Lazy::new(|| {
    vec![
        // tool names, exact
        route("deck-summary", Tool(Exact("decksummarytool")), R::DeckSummary),
        route("exchange-limits", Tool(Exact("exchangelimitstool")), R::ExchangeLimits),
        route("load-curve", Tool(Exact("loadcurvetool")), R::LoadCurve),
        // tool names, substring; more specific patterns before broader ones
        route("small-plants", Tool(Contains("pequenas_usinas")), R::SmallPlants),
        route("small-plants-en", Tool(Contains("small_plant")), R::SmallPlants),
        route("min-generation", Tool(Contains("gtmin")), R::MinimumGeneration),
        route("min-generation-en", Tool(Contains("minimum_generation")), R::MinimumGeneration),
        route("min-generation-camel", Tool(Contains("mingeneration")), R::MinimumGeneration),
        route("flow-restriction", Tool(Contains("restricao_vazao")), R::FlowRestriction),
        route("flow-restriction-en", Tool(Contains("flowrestriction")), R::FlowRestriction),
        route("flow-restriction-snake", Tool(Contains("flow_restriction")), R::FlowRestriction),
        route("thermal-costs-cvu", Tool(Contains("cvu")), R::ThermalCosts),
        route("thermal-costs", Tool(Contains("thermalcost")), R::ThermalCosts),
        route("thermal-costs-snake", Tool(Contains("thermal_cost")), R::ThermalCosts),
        route("thermal-plants", Tool(Contains("thermal")), R::ThermalPlants),
        route("thermal-plants-pt", Tool(Contains("termic")), R::ThermalPlants),
        route("exchange", Tool(Contains("intercambio")), R::ExchangeLimits),
        route("exchange-en", Tool(Contains("exchange")), R::ExchangeLimits),
        route("load", Tool(Contains("carga")), R::LoadCurve),
        route("load-en", Tool(Contains("load")), R::LoadCurve),
        route("deficit", Tool(Contains("deficit")), R::DeficitCosts),
        route("modifications", Tool(Contains("modif")), R::PlantModifications),
        route("expansion", Tool(Contains("expansion")), R::PlantModifications),
        route("maintenance", Tool(Contains("manutencao")), R::Maintenance),
        route("maintenance-en", Tool(Contains("maintenance")), R::Maintenance),
        route("reservoir", Tool(Contains("reservatorio")), R::Reservoirs),
        route("reservoir-en", Tool(Contains("reservoir")), R::Reservoirs),
        route("inflows", Tool(Contains("vazoes")), R::Inflows),
        route("inflows-en", Tool(Contains("inflow")), R::Inflows),
        route("hydro", Tool(Contains("hydro")), R::HydroPlants),
        route("hydro-pt", Tool(Contains("hidro")), R::HydroPlants),
        route("submarkets", Tool(Contains("submercado")), R::Submarkets),
        route("submarkets-en", Tool(Contains("submarket")), R::Submarkets),
        // visualization types
        route("viz-load-curve", Viz(Exact("load_curve")), R::LoadCurve),
        route("viz-exchange", Viz(Contains("exchange")), R::ExchangeLimits),
        route("viz-line", Viz(Contains("line")), R::LineChart),
        route("viz-timeseries", Viz(Contains("time_series")), R::LineChart),
        route("viz-bar", Viz(Contains("bar")), R::BarChart),
        route("viz-table", Viz(Exact("table")), R::Table),
        // fallbacks
        route("generic", Rule::HasData, R::Generic),
        route("not-implemented", Rule::Always, R::NotImplemented),
    ]
});

pub fn route_for(payload: &ReportPayload) -> &'static Route {
    ROUTES
        .iter()
        .find(|r| r.rule.matches(payload))
        .unwrap_or(&NOT_IMPLEMENTED)
}

static NOT_IMPLEMENTED: Route = route("not-implemented", Rule::Always, Renderer::NotImplemented);

pub fn renderer_for(payload: &ReportPayload) -> Renderer {
    route_for(payload).renderer
}
