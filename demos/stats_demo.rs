use std::hash::BuildHasher;
use std::hash::RandomState;

use clap::Parser;
use swiss_hash::HashTable;
use swiss_hash::hash_table::DebugStats;

/// Fill a table, punch tombstones into it, then keep inserting until the
/// table reorganizes, reporting the control-byte statistics at each stage.
#[derive(Parser, Debug)]
struct Args {
    #[arg(short = 'c', long = "target_capacity", default_value_t = 1000)]
    target_capacity: usize,

    /// Percentage of the inserted values to remove before refilling.
    #[arg(short = 'r', long = "remove_percent", default_value_t = 75)]
    remove_percent: usize,

    /// Also print the probe-length histogram after each stage.
    #[arg(long)]
    histogram: bool,
}

struct Demo {
    state: RandomState,
    table: HashTable<u64>,
    histogram: bool,
}

impl Demo {
    fn hash(&self, value: u64) -> u64 {
        self.state.hash_one(value)
    }

    fn insert(&mut self, value: u64) {
        let hash = self.hash(value);
        let state = &self.state;
        self.table
            .entry(hash, |&v| v == value, |&v| state.hash_one(v))
            .or_insert(value);
    }

    fn erase(&mut self, value: u64) -> bool {
        let hash = self.hash(value);
        self.table.erase(hash, |&v| v == value)
    }

    fn report(&self, stage: &str) -> DebugStats {
        println!();
        println!("--- {stage} ---");
        let stats = self.table.debug_stats();
        stats.print();
        if self.histogram {
            let state = &self.state;
            self.table.probe_histogram(|&v| state.hash_one(v)).print();
        }
        stats
    }
}

fn main() {
    let args = Args::parse();

    let mut demo = Demo {
        state: RandomState::new(),
        table: HashTable::with_capacity(args.target_capacity),
        histogram: args.histogram,
    };

    let budget = demo.table.capacity() as u64;
    println!(
        "Requested {} elements, got a budget of {}",
        args.target_capacity, budget
    );

    for value in 0..budget {
        demo.insert(value);
    }
    let full = demo.report("filled to the growth budget");

    let to_remove = budget * args.remove_percent.min(100) as u64 / 100;
    for value in 0..to_remove {
        demo.erase(value);
    }
    let punched = demo.report("after removals");
    println!(
        "Removed {to_remove} values: {} slots are now tombstones and the budget did not come back",
        punched.tombstones
    );

    // Removals never return budget. New values may land on tombstones, but
    // once the `EMPTY` budget runs out the table reorganizes: either a rehash
    // in place (dropping every tombstone at once) or a doubling.
    let mut next = budget;
    let mut before = punched.clone();
    for _ in 0..2 * budget + 1 {
        demo.insert(next);
        next += 1;
        let now = demo.table.debug_stats();
        let reorganized =
            now.total_slots != before.total_slots || now.tombstones + 1 < before.tombstones;
        before = now;
        if reorganized {
            break;
        }
    }
    println!("Inserted {} new values", next - budget);
    let refilled = demo.report("after refilling past the budget");

    if refilled.total_slots == full.total_slots {
        println!(
            "Rehashed in place at {} slots: {} tombstones reclaimed",
            refilled.total_slots,
            punched.tombstones.saturating_sub(refilled.tombstones)
        );
    } else {
        println!(
            "Grew from {} to {} slots: too few tombstones to rehash in place",
            full.total_slots, refilled.total_slots
        );
    }
}
