//! Sim Trader - Headless demo entry point
//!
//! Subscribes to the symbols given on the command line (vt_symbol form, e.g.
//! `CL.NYMEX`), sends one demo order and prints the tick table as CSV.

use std::error::Error;
use std::io;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use sim_trader::trader::init_logger;
use sim_trader::{
    Direction, MainEngine, OrderRequest, OrderType, SubscribeRequest, TickMonitor, SETTINGS,
};

const DEFAULT_SYMBOL: &str = "AAPL.SMART";
const DEMO_VOLUME: f64 = 100.0;
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

fn main() -> Result<(), Box<dyn Error>> {
    if let Err(e) = init_logger(&SETTINGS) {
        eprintln!("Logger not initialized: {}", e);
    }
    info!("Sim Trader v{}", sim_trader::VERSION);

    let mut symbols: Vec<String> = std::env::args().skip(1).collect();
    if symbols.is_empty() {
        symbols.push(DEFAULT_SYMBOL.to_string());
    }
    let requests = symbols
        .iter()
        .map(|s| SubscribeRequest::from_vt_symbol(s))
        .collect::<Result<Vec<_>, _>>()?;

    let main_engine = MainEngine::from_settings(&SETTINGS)?;
    let mut monitor = TickMonitor::new();
    monitor.attach(main_engine.event_engine());

    let mut last_tick = None;
    for req in &requests {
        let tick = main_engine.subscribe(req)?;
        info!(vt_symbol = %tick.vt_symbol(), last = tick.last_price, "Subscribed");
        last_tick = Some(tick);
    }

    let mut expected = requests.len();
    if let Some(tick) = last_tick {
        let order = OrderRequest::new(
            tick.symbol.clone(),
            tick.exchange,
            Direction::Long,
            OrderType::Limit,
            DEMO_VOLUME,
        )
        .with_price(tick.last_price.max(0.0));

        match main_engine.send_order(&order) {
            Ok(_) => expected += 1,
            Err(e) => warn!("Demo order rejected: {}", e),
        }
    }

    // Ticks arrive on the dispatch thread; give them a moment to land
    let deadline = Instant::now() + DRAIN_TIMEOUT;
    let mut received = 0;
    while received < expected && Instant::now() < deadline {
        received += monitor.process_pending();
        thread::sleep(Duration::from_millis(10));
    }
    if received < expected {
        warn!(received, expected, "Not every tick reached the monitor");
    }

    monitor.write_csv(io::stdout().lock())?;

    monitor.detach();
    main_engine.close();
    info!("Sim Trader exited");
    Ok(())
}
