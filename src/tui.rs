//! Utilities for terminal output.
//!
//! Every macro takes the `greppable` and `accessible` flags: greppable output
//! suppresses all decoration, accessible output drops the coloured markers.
pub use colored::Colorize;

#[macro_export]
macro_rules! warning {
    ($name:expr) => {
        eprintln!(
            "{} {}",
            $crate::tui::Colorize::bold($crate::tui::Colorize::red("[!]")),
            $name
        );
    };
    ($name:expr, $greppable:expr, $accessible:expr) => {
        // greppable output stays machine readable, so nothing is printed
        if !$greppable {
            if $accessible {
                eprintln!("{}", $name);
            } else {
                eprintln!(
                    "{} {}",
                    $crate::tui::Colorize::bold($crate::tui::Colorize::red("[!]")),
                    $name
                );
            }
        }
    };
}

#[macro_export]
macro_rules! detail {
    ($name:expr) => {
        println!(
            "{} {}",
            $crate::tui::Colorize::bold($crate::tui::Colorize::blue("[~]")),
            $name
        );
    };
    ($name:expr, $greppable:expr, $accessible:expr) => {
        if !$greppable {
            if $accessible {
                println!("{}", $name);
            } else {
                println!(
                    "{} {}",
                    $crate::tui::Colorize::bold($crate::tui::Colorize::blue("[~]")),
                    $name
                );
            }
        }
    };
}

#[macro_export]
macro_rules! output {
    ($name:expr) => {
        println!(
            "{} {}",
            $crate::tui::Colorize::bold($crate::tui::Colorize::green("[>]")),
            $name
        );
    };
    ($name:expr, $greppable:expr, $accessible:expr) => {
        if !$greppable {
            if $accessible {
                println!("{}", $name);
            } else {
                println!(
                    "{} {}",
                    $crate::tui::Colorize::bold($crate::tui::Colorize::green("[>]")),
                    $name
                );
            }
        }
    };
}

/// Name, version and a one-line reminder of what the tool is for.
pub fn print_opening(greppable: bool, accessible: bool) {
    if greppable {
        return;
    }
    let title = format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    if accessible {
        println!("{title}");
    } else {
        println!("{}", title.bold().cyan());
    }
    println!("Only probe hosts you are authorised to test.\n");
}
