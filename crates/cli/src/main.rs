//! actledger binary

use actledger::error::CommandError;
use clap::Parser;

fn main() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(false)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))
    .ok();

    let cli = actledger::Cli::parse();

    if let Err(e) = actledger::run(cli) {
        // Commands that already printed their findings only need the verdict
        let reported = matches!(
            e.downcast_ref::<CommandError>(),
            Some(
                CommandError::ActionsFailed { .. }
                    | CommandError::ReviewFailed(_)
                    | CommandError::InvalidLedgers { .. }
            )
        );

        if reported {
            eprintln!("\n{e}");
        } else {
            let report = miette::Report::msg(format!("{e:#}"));
            eprintln!("{report:?}");
        }
        std::process::exit(1);
    }
}
