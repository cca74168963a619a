mod app;
mod clipboard;
mod error;
mod otp;
mod registry;
mod scan;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use qrcode::QrCode;
use qrcode::render::unicode;

use crate::app::{AddSource, GeneratedCode, TwoFa};

#[derive(Parser, Debug)]
#[command(
    name = "twofa",
    version,
    about = "Two-factor authentication codes from your terminal"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register a new service from a provisioning QR code
    Add {
        /// Service name, e.g. github
        service: String,
        /// Read the QR code from an image file instead of capturing the screen
        #[arg(short, long)]
        image: Option<PathBuf>,
    },

    /// Delete a registered service
    Del {
        /// Service name
        service: String,
    },

    /// Generate the current authentication code
    ///
    /// Without a service name, prints a table with the codes of every
    /// registered service.
    Gen {
        /// Service name
        service: Option<String>,
        /// Also copy the code to the clipboard
        #[arg(long)]
        clip: bool,
    },

    /// Render the stored provisioning QR code in the terminal
    Qrcode {
        /// Service name
        service: String,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{}", format!("{e:#}").red().bold());
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut twofa = TwoFa::open()?;

    match cli.command {
        Commands::Add { service, image } => cmd_add(&mut twofa, &service, image),
        Commands::Del { service } => cmd_del(&mut twofa, &service),
        Commands::Gen {
            service: Some(service),
            clip,
        } => cmd_gen(&twofa, &service, clip),
        Commands::Gen {
            service: None,
            clip: _,
        } => cmd_gen_all(&twofa),
        Commands::Qrcode { service } => cmd_qrcode(&twofa, &service),
    }
}

fn cmd_add(twofa: &mut TwoFa, service: &str, image: Option<PathBuf>) -> anyhow::Result<()> {
    let source = match image {
        Some(path) => AddSource::ImageFile(path),
        None => AddSource::ScreenCapture,
    };
    let code = twofa.add(service, &source)?;
    println!(
        "{}",
        format!("The \"{service}\" added with success!").green()
    );
    println!("{} - {}: {}", code.service, code.label, code.code);
    Ok(())
}

fn cmd_del(twofa: &mut TwoFa, service: &str) -> anyhow::Result<()> {
    twofa.del(service)?;
    println!("{}", format!("The \"{service}\" was removed.").green());
    Ok(())
}

fn cmd_gen(twofa: &TwoFa, service: &str, clip: bool) -> anyhow::Result<()> {
    let code = twofa.r#gen(service)?;
    println!(
        "{}",
        format!("{} - {}: {}", code.service, code.label, code.code).green()
    );
    if clip {
        clipboard::copy(&code.code)?;
        println!("Code copied to clipboard.");
    }
    Ok(())
}

fn cmd_gen_all(twofa: &TwoFa) -> anyhow::Result<()> {
    let codes = twofa.gen_all()?;
    if codes.is_empty() {
        println!("No services registered.");
        return Ok(());
    }
    println!("Listing all services and your codes.");
    print_code_table(&codes);
    Ok(())
}

fn cmd_qrcode(twofa: &TwoFa, service: &str) -> anyhow::Result<()> {
    let uri = twofa.uri(service)?;
    let qr = QrCode::new(uri).context("cannot render the stored URI as a QR code")?;
    let art = qr
        .render::<unicode::Dense1x2>()
        .quiet_zone(true)
        .build();
    println!("{art}");
    Ok(())
}

fn print_code_table(codes: &[GeneratedCode]) {
    let service_w = column_width("SERVICE", codes.iter().map(|c| c.service.as_str()));
    let label_w = column_width("LABEL", codes.iter().map(|c| c.label.as_str()));

    println!(
        "{}",
        format!("{:<service_w$}  {:<label_w$}  CODE", "SERVICE", "LABEL").bold()
    );
    for code in codes {
        println!(
            "{:<service_w$}  {:<label_w$}  {}",
            code.service,
            code.label,
            code.code.green()
        );
    }
}

fn column_width<'a>(header: &str, values: impl Iterator<Item = &'a str>) -> usize {
    values
        .map(|v| v.chars().count())
        .chain(std::iter::once(header.len()))
        .max()
        .unwrap_or(0)
}
