use ahash::AHashMap;
use clap::{Parser, Subcommand};
use keisan::ast::DisplayExpression;
use keisan::parser;
use keisan::prelude::*;
use keisan::process::process_from_json;
use std::fs;
use std::io::{self, Write};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Evaluates calculated-field formulas against process step data
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Run in interactive mode to be prompted for formulas
    #[arg(short = 'i', long, help = "Run in interactive 'human' mode")]
    human: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate a single formula
    Eval {
        /// The formula, e.g. "[Step1.price] * [Step1.quantity]"
        formula: String,
        /// Path to a JSON array of step records
        #[arg(short, long)]
        records: Option<String>,
        /// Decimal places of the formatted result
        #[arg(short, long, default_value_t = 2)]
        decimals: usize,
        /// Print how the value was calculated and the parsed expression tree
        #[arg(long)]
        explain: bool,
    },
    /// Validate a process definition and compute all of its calculated fields
    Process {
        /// Path to the process definition JSON file
        definition: String,
        /// Path to a JSON array of step records
        #[arg(short, long)]
        records: Option<String>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.human {
        run_interactive();
        return;
    }

    match cli.command {
        Some(Command::Eval {
            formula,
            records,
            decimals,
            explain,
        }) => {
            let records = load_records(records.as_deref());
            run_eval(&formula, &records, decimals, explain);
        }
        Some(Command::Process {
            definition,
            records,
        }) => {
            let records = load_records(records.as_deref());
            run_process(&definition, &records);
        }
        None => exit_with_error("A command is required in non-interactive mode. See --help."),
    }
}

fn load_records(path: Option<&str>) -> Vec<StepRecord> {
    match path {
        Some(path) => StepRecord::list_from_file(path).unwrap_or_else(|e| {
            exit_with_error(&format!("Failed to load step records from '{}': {}", path, e))
        }),
        None => Vec::new(),
    }
}

fn run_eval(formula: &str, records: &[StepRecord], decimals: usize, explain: bool) {
    let start = Instant::now();
    let result = calculate_field_value(formula, records);
    let duration = start.elapsed();

    print_result(&result, decimals);
    if explain {
        if let Some(explanation) = &result.explanation {
            println!("  -> Calculation: {}", explanation);
        }
        let extracted = extract_references(formula, records);
        if let Ok(ast) = parser::parse(&extracted.expression) {
            let labels = extracted.labels();
            println!("\n--- Expression Tree ---");
            print!("{}", DisplayExpression {
                expr: &ast,
                labels: &labels,
            });
        }
        println!("\nEvaluated in {:?}", duration);
    }

    if !result.is_ok() {
        std::process::exit(2);
    }
}

fn run_process(definition_path: &str, records: &[StepRecord]) {
    let json = fs::read_to_string(definition_path).unwrap_or_else(|e| {
        exit_with_error(&format!(
            "Failed to read process definition '{}': {}",
            definition_path, e
        ))
    });
    let definition = process_from_json(&json)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to parse process definition: {}", e)));

    if let Err(e) = definition.validate() {
        exit_with_error(&format!("Process definition is invalid: {}", e));
    }
    println!(
        "Process '{}' is valid ({} steps, {:?} mode)",
        definition.name,
        definition.steps.len(),
        definition.mode
    );

    let mut calculated_values: AHashMap<u32, usize> = AHashMap::new();
    for order in definition.step_orders() {
        let fields = definition
            .calculate_step(order, records)
            .unwrap_or_else(|e| exit_with_error(&e.to_string()));
        if fields.is_empty() {
            continue;
        }
        println!("\nStep {}:", order);
        for field in &fields {
            match &field.display {
                Some(display) => println!("  {} = {}", field.label, display),
                None => println!(
                    "  {} = (unavailable: {})",
                    field.label,
                    field.result.error_message().unwrap_or_default()
                ),
            }
            if field.result.has_missing_refs() {
                println!("    missing: {}", field.result.missing_refs.join(", "));
            }
        }
        *calculated_values.entry(order).or_default() += fields.len();
    }

    let total: usize = calculated_values.values().sum();
    println!("\n{} calculated fields across {} steps", total, calculated_values.len());
}

fn print_result(result: &CalculationResult, decimals: usize) {
    match result.value {
        Some(value) => println!("  -> Value: {}", format_calculated_value(value, decimals)),
        None => println!(
            "  -> Unavailable: {}",
            result.error_message().unwrap_or_default()
        ),
    }
    if result.has_missing_refs() {
        println!("  -> Missing (counted as 0): {}", result.missing_refs.join(", "));
    }
}

/// Runs the CLI in an interactive, human-friendly mode with prompts.
fn run_interactive() {
    println!("--- Keisan Interactive Mode ---");

    let records_path = prompt_for_input("Enter step records path (optional)");
    let records = if records_path.is_empty() {
        Vec::new()
    } else {
        load_records(Some(records_path.as_str()))
    };
    println!("Loaded {} step records. Enter an empty line to quit.", records.len());

    loop {
        let formula = prompt_for_input("Formula");
        if formula.is_empty() {
            break;
        }
        let result = calculate_field_value(&formula, &records);
        print_result(&result, 2);
        if let Some(explanation) = &result.explanation {
            println!("  -> Calculation: {}", explanation);
        }
    }
}

/// A helper function to prompt the user and read a trimmed line of input.
fn prompt_for_input(prompt_text: &str) -> String {
    let mut line = String::new();

    print!("> {}: ", prompt_text);
    if let Err(e) = io::stdout().flush() {
        exit_with_error(&format!("Failed to write prompt: {}", e));
    }

    if let Err(e) = io::stdin().read_line(&mut line) {
        exit_with_error(&format!("Failed to read line: {}", e));
    }
    line.trim().to_string()
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
