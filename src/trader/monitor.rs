//! Headless table monitors for the trading terminal.
//!
//! A [`Monitor`] keeps the rows a table widget would show: newest first,
//! keyed rows updated in place, every cell already rendered to text with a
//! color role. Event handlers never touch the table. [`Monitor::attach`]
//! forwards payloads over a channel and the owning thread applies them with
//! [`Monitor::process_pending`].

use chrono::{DateTime, Local, Timelike, Utc};
use std::collections::VecDeque;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use tracing::{debug, info};

use super::constant::Direction;
use super::event::{EVENT_POSITION, EVENT_TICK, EVENT_TRADE};
use super::object::{PositionData, TickData, TradeData};
use super::setting::SETTINGS;
use crate::error::Result;
use crate::event::{Event, EventEngine, EventHandler};

/// Rows kept by a monitor without a data key when `remove_num` is unset
const DEFAULT_REMOVE_NUM: usize = 30;

/// How a cell renders and which color role it gets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Base,
    Enum,
    Direction,
    Bid,
    Ask,
    Pnl,
    Time,
}

/// Foreground role of a rendered cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellColor {
    #[default]
    Default,
    Long,
    Short,
    Bid,
    Ask,
}

impl CellColor {
    fn for_cell(kind: CellKind, text: &str) -> Self {
        match kind {
            CellKind::Direction if text == Direction::Long.value() => CellColor::Long,
            CellKind::Direction if text == Direction::Short.value() => CellColor::Short,
            CellKind::Bid => CellColor::Bid,
            CellKind::Ask => CellColor::Ask,
            CellKind::Pnl if text.starts_with('-') => CellColor::Short,
            CellKind::Pnl => CellColor::Long,
            _ => CellColor::Default,
        }
    }
}

/// Column definition for monitor tables
pub struct ColumnDef<T> {
    pub key: &'static str,
    pub display: &'static str,
    pub kind: CellKind,
    pub update: bool,
    pub render: fn(&T) -> String,
}

impl<T> ColumnDef<T> {
    pub fn new(
        key: &'static str,
        display: &'static str,
        kind: CellKind,
        update: bool,
        render: fn(&T) -> String,
    ) -> Self {
        Self {
            key,
            display,
            kind,
            update,
            render,
        }
    }

    fn cell(&self, data: &T) -> Cell {
        let text = (self.render)(data);
        let color = CellColor::for_cell(self.kind, &text);
        Cell { text, color }
    }
}

/// Data types a [`Monitor`] can display
pub trait MonitorData: Send + Sync + Sized + 'static {
    /// Event type carrying this data
    const EVENT_TYPE: &'static str;

    fn columns() -> Vec<ColumnDef<Self>>;

    /// Rows sharing a key are updated in place. `None` inserts every record as a new row.
    fn data_key(&self) -> Option<String> {
        None
    }
}

/// Time format is 12:12:12.5
pub fn format_time(dt: &DateTime<Utc>) -> String {
    let local = dt.with_timezone(&Local);
    let timestamp = local.format("%H:%M:%S").to_string();
    let millisecond = local.nanosecond() % 1_000_000_000 / 1_000_000;
    if millisecond > 0 {
        format!("{}.{}", timestamp, millisecond)
    } else {
        timestamp
    }
}

fn format_price(value: f64) -> String {
    format!("{:.2}", value)
}

fn format_volume(value: f64) -> String {
    format!("{:.0}", value)
}

impl MonitorData for TickData {
    const EVENT_TYPE: &'static str = EVENT_TICK;

    fn columns() -> Vec<ColumnDef<Self>> {
        type Column = ColumnDef<TickData>;

        vec![
            Column::new("symbol", "Code", CellKind::Base, false, |t| t.symbol.clone()),
            Column::new("exchange", "Exchange", CellKind::Enum, false, |t| t.exchange.to_string()),
            Column::new("name", "Name", CellKind::Base, true, |t| t.name.clone()),
            Column::new("last_price", "Last", CellKind::Base, true, |t| format_price(t.last_price)),
            Column::new("last_volume", "Volume", CellKind::Base, true, |t| format_volume(t.last_volume)),
            Column::new("open_price", "Open", CellKind::Base, true, |t| format_price(t.open_price)),
            Column::new("high_price", "High", CellKind::Base, true, |t| format_price(t.high_price)),
            Column::new("low_price", "Low", CellKind::Base, true, |t| format_price(t.low_price)),
            Column::new("bid_price_1", "Bid Price", CellKind::Bid, true, |t| format_price(t.bid_price_1)),
            Column::new("bid_volume_1", "Bid Volume", CellKind::Bid, true, |t| format_volume(t.bid_volume_1)),
            Column::new("ask_price_1", "Ask Price", CellKind::Ask, true, |t| format_price(t.ask_price_1)),
            Column::new("ask_volume_1", "Ask Volume", CellKind::Ask, true, |t| format_volume(t.ask_volume_1)),
            Column::new("datetime", "Time", CellKind::Time, true, |t| format_time(&t.datetime)),
        ]
    }
}

impl MonitorData for TradeData {
    const EVENT_TYPE: &'static str = EVENT_TRADE;

    fn columns() -> Vec<ColumnDef<Self>> {
        type Column = ColumnDef<TradeData>;

        vec![
            Column::new("tradeid", "Trade ID", CellKind::Base, false, |t| t.tradeid.clone()),
            Column::new("orderid", "Order ID", CellKind::Base, false, |t| t.orderid.clone()),
            Column::new("symbol", "Code", CellKind::Base, false, |t| t.symbol.clone()),
            Column::new("exchange", "Exchange", CellKind::Enum, false, |t| t.exchange.to_string()),
            Column::new("direction", "Direction", CellKind::Direction, false, |t| t.direction.to_string()),
            Column::new("price", "Price", CellKind::Base, false, |t| format_price(t.price)),
            Column::new("volume", "Volume", CellKind::Base, false, |t| format_volume(t.volume)),
            Column::new("datetime", "Time", CellKind::Time, false, |t| {
                t.datetime.as_ref().map(format_time).unwrap_or_default()
            }),
        ]
    }

    fn data_key(&self) -> Option<String> {
        Some(self.vt_tradeid())
    }
}

impl MonitorData for PositionData {
    const EVENT_TYPE: &'static str = EVENT_POSITION;

    fn columns() -> Vec<ColumnDef<Self>> {
        type Column = ColumnDef<PositionData>;

        vec![
            Column::new("symbol", "Code", CellKind::Base, false, |p| p.symbol.clone()),
            Column::new("exchange", "Exchange", CellKind::Enum, false, |p| p.exchange.to_string()),
            Column::new("direction", "Direction", CellKind::Direction, false, |p| p.direction.to_string()),
            Column::new("all_volume", "Position", CellKind::Base, true, |p| format_volume(p.all_volume)),
            Column::new("price", "Cost", CellKind::Base, false, |p| format_price(p.price)),
            Column::new("pnl", "PNL", CellKind::Pnl, true, |p| format_price(p.pnl)),
        ]
    }

    fn data_key(&self) -> Option<String> {
        Some(self.vt_positionid())
    }
}

/// Rendered table cell
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub text: String,
    pub color: CellColor,
}

/// One table row, cells ordered like the columns
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub key: Option<String>,
    pub cells: Vec<Cell>,
}

struct Attachment<T> {
    event_engine: Arc<EventEngine>,
    handler: EventHandler,
    receiver: Receiver<Arc<T>>,
}

/// Table model for one data type
pub struct Monitor<T: MonitorData> {
    columns: Vec<ColumnDef<T>>,
    rows: VecDeque<Row>,
    remove_num: usize,
    attachment: Option<Attachment<T>>,
}

pub type TickMonitor = Monitor<TickData>;
pub type TradeMonitor = Monitor<TradeData>;
pub type PositionMonitor = Monitor<PositionData>;

impl<T: MonitorData> Monitor<T> {
    /// Create a monitor capped at the `remove_num` setting
    pub fn new() -> Self {
        let remove_num = SETTINGS
            .get_int("remove_num")
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(DEFAULT_REMOVE_NUM);
        Self::with_remove_num(remove_num)
    }

    /// Create a monitor keeping at most `remove_num` unkeyed rows
    pub fn with_remove_num(remove_num: usize) -> Self {
        Self {
            columns: T::columns(),
            rows: VecDeque::new(),
            remove_num: remove_num.max(1),
            attachment: None,
        }
    }

    pub fn columns(&self) -> &[ColumnDef<T>] {
        &self.columns
    }

    /// Display names of all columns
    pub fn headers(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.display).collect()
    }

    /// Rows, newest first
    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Text of the cell in `row` under column `key`
    pub fn cell(&self, row: usize, key: &str) -> Option<&Cell> {
        let column = self.columns.iter().position(|c| c.key == key)?;
        self.rows.get(row)?.cells.get(column)
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Apply one record to the table
    pub fn process_data(&mut self, data: &T) {
        match data.data_key() {
            None => {
                self.insert_new_row(None, data);
                self.rows.truncate(self.remove_num);
            }
            Some(key) => {
                let existing = self
                    .rows
                    .iter()
                    .position(|row| row.key.as_deref() == Some(key.as_str()));
                match existing {
                    Some(index) => self.update_old_row(index, data),
                    None => self.insert_new_row(Some(key), data),
                }
            }
        }
    }

    fn insert_new_row(&mut self, key: Option<String>, data: &T) {
        let cells = self.columns.iter().map(|column| column.cell(data)).collect();
        self.rows.push_front(Row { key, cells });
    }

    fn update_old_row(&mut self, index: usize, data: &T) {
        let Some(row) = self.rows.get_mut(index) else {
            return;
        };
        for (column, cell) in self.columns.iter().zip(row.cells.iter_mut()) {
            if column.update {
                *cell = column.cell(data);
            }
        }
    }

    /// Listen for `T::EVENT_TYPE` on `event_engine`.
    ///
    /// The handler only forwards payloads; call [`Self::process_pending`] on
    /// the owning thread to apply them.
    pub fn attach(&mut self, event_engine: &Arc<EventEngine>) {
        self.detach();

        let (sender, receiver) = mpsc::channel::<Arc<T>>();
        let handler: EventHandler = Arc::new(move |event: &Event| {
            if let Some(data) = event.data_arc::<T>() {
                let _ = sender.send(data);
            }
        });
        event_engine.register(T::EVENT_TYPE, Arc::clone(&handler));
        debug!(event_type = T::EVENT_TYPE, "Monitor attached");

        self.attachment = Some(Attachment {
            event_engine: Arc::clone(event_engine),
            handler,
            receiver,
        });
    }

    /// Stop listening. Payloads not yet processed are discarded.
    pub fn detach(&mut self) {
        if let Some(attachment) = self.attachment.take() {
            attachment
                .event_engine
                .unregister(T::EVENT_TYPE, &attachment.handler);
            debug!(event_type = T::EVENT_TYPE, "Monitor detached");
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attachment.is_some()
    }

    /// Apply every payload forwarded since the last call, returns how many
    pub fn process_pending(&mut self) -> usize {
        let pending: Vec<Arc<T>> = match &self.attachment {
            Some(attachment) => attachment.receiver.try_iter().collect(),
            None => return 0,
        };
        for data in &pending {
            self.process_data(data);
        }
        pending.len()
    }

    /// Write the table as CSV: column keys as header, rows newest first
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(self.columns.iter().map(|c| c.key))?;
        for row in &self.rows {
            writer.write_record(row.cells.iter().map(|c| c.text.as_str()))?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Save table data into a csv file
    pub fn save_csv(&self, path: &Path) -> Result<()> {
        self.write_csv(File::create(path)?)?;
        info!(path = %path.display(), rows = self.rows.len(), "Monitor saved");
        Ok(())
    }
}

impl<T: MonitorData> Default for Monitor<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: MonitorData> Drop for Monitor<T> {
    fn drop(&mut self) {
        self.detach();
    }
}
