//! `strata models`: context-window sizes and the budgets derived from them.

use strata_config::AppConfig;
use strata_context::{BudgetConfig, ContextLimits};

pub fn run(config: &AppConfig, ids: &[String]) {
    let limits = ContextLimits::with_defaults().with_overrides(&config.context_limits);

    println!(
        "{:<40} {:>10} {:>10} {:>8} {:>6}",
        "MODEL", "WINDOW", "MAX", "REPLY", "KEEP"
    );
    for id in ids {
        let window = limits.limit_for(id);
        let budget = BudgetConfig::for_context_window(window);
        println!(
            "{:<40} {:>10} {:>10} {:>8} {:>6}",
            id,
            window,
            budget.max_context_tokens,
            budget.reserved_for_reply,
            budget.min_messages_to_keep
        );
    }
}
