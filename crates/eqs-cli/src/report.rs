// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Human (table) and machine (JSON) renderings of query runs.

use comfy_table::{presets::UTF8_FULL, Cell, Table};
use eqs_core::{Catalog, QueryResult, QueryStatus, World};
use serde::Serialize;

/// One returned item.
#[derive(Debug, Serialize)]
pub struct ItemRow {
    /// Position in the result, best first.
    pub rank: usize,
    /// Final score.
    pub score: f32,
    /// Location, when the item has one.
    pub location: Option<[f32; 3]>,
    /// Actor handle for actor items.
    pub actor: Option<u64>,
}

/// Outcome of one `eqs run`.
#[derive(Debug, Serialize)]
pub struct RunReport {
    /// Template name.
    pub template: String,
    /// Terminal status.
    pub status: QueryStatus,
    /// Option that produced the items.
    pub option: Option<usize>,
    /// Scheduler ticks used (0 for instant runs).
    pub ticks: u32,
    /// Steps executed across those ticks.
    pub steps: u32,
    /// Returned items.
    pub items: Vec<ItemRow>,
}

impl RunReport {
    pub fn new(template: &str, result: &QueryResult, world: &dyn World, ticks: u32, steps: u32) -> Self {
        let items = result
            .items
            .iter()
            .enumerate()
            .map(|(rank, item)| ItemRow {
                rank,
                score: item.score,
                location: result
                    .item_type
                    .and_then(|item_type| item.location(item_type, world))
                    .map(|location| location.to_array()),
                actor: item.actor().map(|actor| actor.0),
            })
            .collect();
        Self {
            template: template.to_owned(),
            status: result.status,
            option: result.option_index,
            ticks,
            steps,
            items,
        }
    }

    pub fn summary(&self) -> String {
        let option = self
            .option
            .map_or_else(|| "-".to_owned(), |option| option.to_string());
        format!(
            "template={} status={:?} option={option} ticks={} steps={} items={}",
            self.template,
            self.status,
            self.ticks,
            self.steps,
            self.items.len()
        )
    }

    pub fn table(&self) -> Table {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["#", "score", "x", "y", "z", "actor"]);
        for row in &self.items {
            let coord = |axis: usize| {
                row.location
                    .map_or_else(|| "-".to_owned(), |location| format!("{:.2}", location[axis]))
            };
            table.add_row(vec![
                Cell::new(row.rank),
                Cell::new(format!("{:.4}", row.score)),
                Cell::new(coord(0)),
                Cell::new(coord(1)),
                Cell::new(coord(2)),
                Cell::new(row.actor.map_or_else(|| "-".to_owned(), |actor| actor.to_string())),
            ]);
        }
        table
    }
}

pub fn catalog_table(catalog: &Catalog) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["category", "kind"]);
    let groups = [
        ("context", &catalog.contexts),
        ("generator", &catalog.generators),
        ("test", &catalog.tests),
    ];
    for (category, kinds) in groups {
        for kind in kinds {
            table.add_row(vec![category, kind.as_str()]);
        }
    }
    table
}
