use crate::infra::{InMemoryContractRepository, InMemoryOutbox};
use chrono::{Duration, Local, NaiveDate, Utc};
use clap::Args;
use lease_desk::config::ContractSettings;
use lease_desk::contracts::upload::PDF_MIME;
use lease_desk::contracts::{
    ContractService, DeliveryChannel, DisplayStatus, LeaseTerms, PortfolioReport,
    SignatureCapture, SigningContext, StrokePoint, TenantContact, UploadDetails,
};
use lease_desk::error::AppError;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Reporting date for derived statuses (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Send the signature request by e-mail instead of WhatsApp.
    #[arg(long)]
    pub(crate) email: bool,
    /// Write the portfolio report as CSV to this path instead of stdout.
    #[arg(long)]
    pub(crate) csv: Option<PathBuf>,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { today, email, csv } = args;
    let today = today.unwrap_or_else(|| Local::now().date_naive());
    let channel = if email {
        DeliveryChannel::Email
    } else {
        DeliveryChannel::WhatsApp
    };

    let repository = Arc::new(InMemoryContractRepository::default());
    let outbox = Arc::new(InMemoryOutbox::default());
    let settings = ContractSettings::default();
    let window = settings.expiring_window_days;
    let service = ContractService::new(repository, outbox.clone(), settings);

    println!("Lease desk demo (as of {today})");

    let record = service.create_from_terms(demo_terms(today))?;
    let id = record.id().clone();
    println!(
        "- Generated {} for {} -> {} page(s), status {}",
        id,
        record.contract.property,
        record.document.page_count(),
        record.contract.status()
    );
    if let Ok(first) = record.document.page(0) {
        let preview: String = first.content.lines().take(3).collect::<Vec<_>>().join(" / ");
        println!("  First page: {preview}");
    }

    service.send(&id, channel, Utc::now()).await?;
    for message in outbox.messages() {
        println!(
            "- Queued {} message to {}",
            message.channel.label(),
            message.recipient.as_deref().unwrap_or("(no address on file)")
        );
        for line in message.body.lines() {
            println!("    {line}");
        }
    }

    let viewed = service.mark_viewed(&id, Utc::now()).await?;
    println!(
        "- Tenant opened the link (viewed: {})",
        viewed.contract.viewed_by_tenant()
    );

    let capture = demo_signature();
    let audit = service
        .sign(
            &id,
            "ana.souza@example.com",
            SigningContext {
                signer_ip: Some("203.0.113.24".to_string()),
                user_agent: Some("LeaseDeskDemo/1.0".to_string()),
            },
            Some(&capture),
        )
        .await?;
    println!("- Signed by {} at {}", audit.signer_identifier(), audit.signed_at());
    println!("  Document hash: {}", audit.document_hash());
    println!(
        "  Signer IP {} | device {} | verified {}",
        audit.signer_ip(),
        audit.user_agent(),
        audit.integrity_verified()
    );

    let signed = service.get(&id)?;
    let view = signed.view(today, window);
    println!(
        "- Contract {} now {} ({} days remaining)",
        view.id, view.display_status, view.days_remaining
    );

    let upload = service.create_from_upload(
        "garden-flat.pdf",
        PDF_MIME,
        b"%PDF-1.7\n% demo lease\n".to_vec(),
        UploadDetails {
            owner_name: "Carla Mendes".to_string(),
            property: "3 Garden Row, Flat B".to_string(),
            tenant: None,
            start_date: today - Duration::days(300),
            end_date: today + Duration::days(65),
            value: 900,
        },
    )?;
    println!(
        "- Stored uploaded contract {} ({})",
        upload.id(),
        upload
            .attachment
            .as_ref()
            .map(|file| file.summary())
            .unwrap_or_default()
    );

    let report = service.portfolio(today)?;
    render_report(&report);
    match csv {
        Some(path) => {
            report.write_csv(File::create(&path)?)?;
            println!("\nPortfolio CSV written to {}", path.display());
        }
        None => {
            println!("\nPortfolio CSV:");
            report.write_csv(std::io::stdout())?;
        }
    }

    Ok(())
}

fn render_report(report: &PortfolioReport) {
    println!("\nPortfolio as of {}", report.as_of);
    for count in report.counts() {
        println!("  - {}: {}", count.label, count.count);
    }
    let expiring = report.expiring();
    if expiring.is_empty() {
        println!("  No contracts expiring within {} days", report.window_days);
    } else {
        println!(
            "  Expiring within {} days (${} monthly):",
            report.window_days,
            report.total_value(DisplayStatus::Expiring)
        );
        for entry in expiring {
            println!(
                "    - {} {} ends {} ({} days)",
                entry.id, entry.property, entry.end_date, entry.days_remaining
            );
        }
    }
}

fn demo_terms(today: NaiveDate) -> LeaseTerms {
    LeaseTerms {
        owner_name: "Carla Mendes".to_string(),
        tenant: Some(TenantContact {
            name: "Ana Souza".to_string(),
            phone: Some("+5511999990000".to_string()),
            email: Some("ana.souza@example.com".to_string()),
        }),
        property_address: "12 Harbor Lane, Apt 3".to_string(),
        start_date: today - Duration::days(340),
        end_date: today + Duration::days(25),
        monthly_rent: 1450,
        deposit: Some(2900),
        payment_day: Some(5),
        city: Some("Lisbon".to_string()),
        extra_clauses: vec![
            "Pets are allowed with prior written consent.".to_string(),
            "The tenant keeps the balcony plants watered.".to_string(),
        ],
    }
}

fn demo_signature() -> SignatureCapture {
    let mut capture = SignatureCapture::default();
    capture.begin_stroke(StrokePoint::new(40.0, 140.0));
    for step in 1..=40 {
        let x = 40.0 + step as f32 * 10.0;
        let y = 120.0 + (step as f32 / 3.0).sin() * 25.0;
        capture.extend_stroke(StrokePoint::new(x, y));
    }
    capture.end_stroke();
    capture
}
