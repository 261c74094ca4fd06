// Copyright 2024 Adobe. All rights reserved.
// This file is licensed to you under the Apache License,
// Version 2.0 (http://www.apache.org/licenses/LICENSE-2.0)
// or the MIT license (http://opensource.org/licenses/MIT),
// at your option.

// Unless required by applicable law or agreed to in writing,
// this software is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR REPRESENTATIONS OF ANY KIND, either express or
// implied. See the LICENSE-MIT and LICENSE-APACHE files for the
// specific language governing permissions and limitations under
// each license.

#![doc = include_str!("../README.md")]

use std::{ffi::CString, path::PathBuf, process::exit};

use analytics::{Calculator, DataPoint, Settings};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::{debug, info};
use rust_core::{calc_destroy, calc_free_string, calc_get_summary, calc_report_leaks, calc_version};

mod client;
use client::{last_error, stack_distance, CalcClient, HeapPoint};

/// Drives the rust_core C API.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct CliArgs {
    /// Path to a .json or .toml settings file.
    #[clap(long, env = "CALCTOOL_SETTINGS")]
    settings: Option<PathBuf>,

    /// Report contract violations as errors instead of aborting.
    #[clap(long)]
    report_violations: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create a calculator, apply operations in order and print its summary.
    Calc {
        /// Owner name.
        #[clap(short, long)]
        name: String,

        /// Starting value.
        #[clap(short, long, default_value_t = 0, allow_negative_numbers = true)]
        start: i32,

        /// Amounts to add.
        #[clap(short, long, allow_negative_numbers = true)]
        add: Vec<i32>,

        /// Amounts to subtract.
        #[clap(long, allow_negative_numbers = true)]
        subtract: Vec<i32>,

        /// Factors to multiply by.
        #[clap(short, long, allow_negative_numbers = true)]
        multiply: Vec<i32>,
    },
    /// Print the distance of a point from the origin.
    Point {
        #[clap(short, long, allow_negative_numbers = true)]
        x: f32,

        #[clap(short, long, allow_negative_numbers = true)]
        y: f32,

        #[clap(short, long, default_value = "point")]
        label: String,

        /// Allocate the point on the library heap.
        #[clap(long)]
        heap: bool,
    },
    /// Run the stack point, heap point and calculator walkthrough.
    Demo,
    /// Break the ownership contract on purpose.
    Misuse {
        #[clap(value_enum)]
        kind: Misuse,
    },
    /// Print the library version.
    Version,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Misuse {
    /// Read a summary after destroying the calculator.
    UseAfterDestroy,
    /// Destroy the same calculator twice.
    DoubleDestroy,
    /// Release the same string twice.
    DoubleFree,
}

fn calc(name: &str, start: i32, add: &[i32], subtract: &[i32], multiply: &[i32]) -> Result<()> {
    let mut calc = CalcClient::new(name, start)?;
    for amount in add {
        calc.add(*amount).context("add failed")?;
    }
    for amount in subtract {
        calc.subtract(*amount).context("subtract failed")?;
    }
    for factor in multiply {
        calc.multiply(*factor).context("multiply failed")?;
    }
    println!("{}", calc.summary()?);
    Ok(())
}

fn point(x: f32, y: f32, label: String, heap: bool) -> Result<()> {
    let c_label = CString::new(label.as_str())?;
    let distance = if heap {
        HeapPoint::new(x, y, &c_label)?.distance()
    } else {
        stack_distance(x, y, &c_label)
    };
    debug!("local distance {}", DataPoint::new(x, y, &label).distance_from_origin());
    println!("{label}: {distance}");
    Ok(())
}

fn demo() -> Result<()> {
    println!("--- Points ---");
    let stack_label = CString::new("Stack Point")?;
    println!("Stack Point distance: {}", stack_distance(3.0, 4.0, &stack_label));

    let heap_label = CString::new("Heap Point")?;
    {
        let heap = HeapPoint::new(10.0, 20.0, &heap_label)?;
        println!(
            "Heap Point ({}, {}) distance: {}",
            heap.x(),
            heap.y(),
            heap.distance()
        );
    }
    println!("System limit: {}", analytics::SYSTEM_LIMIT);

    println!("--- Calculator ---");
    let mut calc = CalcClient::new("Renzo's Calc", 500)?;
    println!("Adding 50...");
    calc.add(50)?;
    println!("Value: {}", calc.value()?);
    println!("Summary: {}", calc.summary()?);

    // the same calculator without crossing the C boundary
    let mut local = Calculator::new("Renzo's Calc", 500)?;
    local.add(50)?;
    info!("local summary: {}", local.summary());
    println!("--- Done ---");
    Ok(())
}

fn misuse(kind: Misuse) -> Result<()> {
    let mut calc = CalcClient::new("misuse", 1)?;
    calc.add(1)?;
    let handle = calc.into_handle();

    match kind {
        Misuse::UseAfterDestroy => {
            calc_destroy(handle);
            let summary = calc_get_summary(handle);
            if summary.is_null() {
                return Err(last_error());
            }
            calc_free_string(summary);
        }
        Misuse::DoubleDestroy => {
            calc_destroy(handle);
            calc_destroy(handle);
            return Err(last_error());
        }
        Misuse::DoubleFree => {
            calc_destroy(handle);
            let version = calc_version();
            calc_free_string(version);
            calc_free_string(version);
            return Err(last_error());
        }
    }
    Ok(())
}

fn version() -> Result<()> {
    let version = calc_version();
    if version.is_null() {
        return Err(last_error());
    }
    // SAFETY: non-null strings from the library are NUL-terminated.
    let text = unsafe { std::ffi::CStr::from_ptr(version) }
        .to_string_lossy()
        .into_owned();
    calc_free_string(version);
    println!("{text}");
    Ok(())
}

fn main() -> Result<()> {
    let args = CliArgs::parse();

    // set RUST_LOG=debug to get detailed debug logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Some(path) = &args.settings {
        Settings::from_file(path)
            .with_context(|| format!("could not load settings from {}", path.display()))?;
    }
    if args.report_violations {
        Settings::set_thread_local_value("violations.policy", "report")?;
    }

    let result = match args.command {
        Commands::Calc {
            name,
            start,
            add,
            subtract,
            multiply,
        } => calc(&name, start, &add, &subtract, &multiply),
        Commands::Point { x, y, label, heap } => point(x, y, label, heap),
        Commands::Demo => demo(),
        Commands::Misuse { kind } => misuse(kind),
        Commands::Version => version(),
    };

    let leaks = calc_report_leaks();
    if let Err(err) = result {
        eprintln!("Error: {err:#}");
        exit(1);
    }
    if leaks > 0 {
        exit(2);
    }
    Ok(())
}
