use anyhow::{bail, Result};
use booking_payments::config::AppConfig;
use booking_payments::domain::notification::{EventType, NotificationEvent, Recipient, RecipientRole};
use booking_payments::domain::payment::PaymentIntent;
use booking_payments::notifications::templates::TemplateCatalog;
use booking_payments::repo::in_memory::InMemoryDeliveryLog;
use booking_payments::service::notification_dispatch::{DispatchSettings, NotificationDispatch};
use booking_payments::vendors::mailer::HttpMailer;
use booking_payments::vendors::payphone::PayPhoneGateway;
use booking_payments::vendors::twilio::TwilioMessaging;
use booking_payments::vendors::{MessagingVendor, PaymentVendor, VendorClient};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Diagnostics for the messaging and payment vendor integrations.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show delivery status and error details of a sent message
    MessageStatus { sid: String },
    /// List the latest messages with their delivery status
    Recent {
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    /// Show the messaging account status
    Account,
    /// Check every configured WhatsApp content template against the vendor
    Templates,
    /// Send a template to a phone number
    SendTest {
        #[arg(long)]
        to: String,
        #[arg(long)]
        template: String,
        /// Template variable as name=value, repeatable
        #[arg(long = "var")]
        vars: Vec<String>,
    },
    /// Create a checkout link to confirm the payment gateway credentials
    PayphoneCheck {
        #[arg(long, default_value = "1.00")]
        amount: Decimal,
        #[arg(long, default_value = "")]
        email: String,
    },
}

fn parse_vars(raw: &[String]) -> Result<BTreeMap<String, String>> {
    raw.iter()
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => Ok((k.trim().to_string(), v.to_string())),
            None => bail!("--var expects name=value, got {}", pair),
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = AppConfig::from_env();
    let client = VendorClient::new(cfg.vendor_timeout_ms);
    let twilio = TwilioMessaging::new(&cfg.twilio, client.clone());

    match cli.command {
        Command::MessageStatus { sid } => {
            let report = twilio.message_status(&sid).await?;
            println!("sid:      {}", report.sid);
            println!("status:   {}", report.raw_status);
            println!("to:       {}", report.to.as_deref().unwrap_or("-"));
            println!("from:     {}", report.from.as_deref().unwrap_or("-"));
            println!("sent:     {}", report.date_sent.as_deref().unwrap_or("-"));
            println!("updated:  {}", report.date_updated.as_deref().unwrap_or("-"));
            if let Some(price) = &report.price {
                println!("price:    {} {}", price, report.price_unit.as_deref().unwrap_or(""));
            }
            if let Some(code) = report.error_code {
                println!("error:    {} {}", code, report.error_message.as_deref().unwrap_or(""));
                if let Some(hint) = report.error_hint {
                    println!("hint:     {}", hint);
                }
            }
            if report.status.is_failure() {
                bail!("message {} was not delivered", report.sid);
            }
        }
        Command::Recent { limit } => {
            for report in twilio.recent_messages(limit).await? {
                println!(
                    "{}  {:<12} {:<28} {}",
                    report.sid,
                    report.raw_status,
                    report.to.as_deref().unwrap_or("-"),
                    report
                        .error_code
                        .map(|c| format!("{} {}", c, report.error_hint.unwrap_or("")))
                        .unwrap_or_default(),
                );
            }
        }
        Command::Account => {
            let account = twilio.account_status().await?;
            println!("account:  {}", account.sid);
            println!("name:     {}", account.friendly_name.as_deref().unwrap_or("-"));
            println!("status:   {}", account.status.as_deref().unwrap_or("-"));
            println!("type:     {}", account.account_type.as_deref().unwrap_or("-"));
            if account.account_type.as_deref() == Some("Trial") {
                println!("note:     trial accounts only deliver to verified numbers");
            }
            if account.status.as_deref() != Some("active") {
                bail!("account is not active");
            }
        }
        Command::Templates => {
            let catalog = TemplateCatalog::standard(&cfg.whatsapp_content_sids);
            let mut problems = 0;
            for (key, template) in catalog.whatsapp_templates() {
                if !template.is_configured() {
                    println!("{:<24} not configured", key);
                    problems += 1;
                    continue;
                }
                match twilio.content_template(&template.content_sid).await {
                    Ok(report) => {
                        let matches = report.variable_count == template.variables.len();
                        println!(
                            "{:<24} {} vars {}/{} approval {}",
                            key,
                            report.sid,
                            report.variable_count,
                            template.variables.len(),
                            report.whatsapp_approval.as_deref().unwrap_or("unknown"),
                        );
                        if !matches {
                            problems += 1;
                        }
                    }
                    Err(e) => {
                        println!("{:<24} {} lookup failed: {}", key, template.content_sid, e);
                        problems += 1;
                    }
                }
            }
            if problems > 0 {
                bail!("{} template(s) need attention", problems);
            }
        }
        Command::SendTest { to, template, vars } => {
            let dispatch = NotificationDispatch::new(
                Arc::new(TemplateCatalog::standard(&cfg.whatsapp_content_sids)),
                Arc::new(twilio),
                Arc::new(HttpMailer::new(&cfg.mail, client)),
                Arc::new(InMemoryDeliveryLog::new()),
                DispatchSettings {
                    transport: cfg.messaging_transport,
                    test_mode: cfg.whatsapp_test_mode,
                    admin_emails: cfg.admin_emails.clone(),
                },
            );
            let event = NotificationEvent {
                event_type: EventType::ServiceReminder,
                recipient_role: RecipientRole::User,
                template_key: template,
                recipient: Recipient {
                    name: None,
                    email: None,
                    phone: Some(to),
                },
                variables: parse_vars(&vars)?,
            };
            let result = dispatch.dispatch(&event).await?;
            println!("transport: {}", result.transport.as_str());
            println!("to:        {}", result.recipient);
            println!("id:        {}", result.message_id.as_deref().unwrap_or("-"));
            if !result.accepted {
                bail!(
                    "rejected: {}",
                    result.error_message.unwrap_or_else(|| "unknown error".to_string())
                );
            }
        }
        Command::PayphoneCheck { amount, email } => {
            let gateway = PayPhoneGateway::new(&cfg.payphone, client);
            let urls = cfg.callback_urls();
            let booking_id = Uuid::new_v4();
            let intent = PaymentIntent::new(
                booking_id,
                amount,
                &email,
                "",
                urls.payment_cancellation_url(booking_id),
                urls.payment_response_url(),
            );
            let checkout = gateway.create_payment(&intent).await?;
            println!("transaction: {}", checkout.transaction_id.as_deref().unwrap_or("-"));
            println!("payment url: {}", checkout.payment_url.as_deref().unwrap_or("-"));
            if checkout.payment_url.is_none() {
                bail!("gateway answered without a payment url: {}", checkout.raw);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vars_are_split_on_first_equals() {
        let vars = parse_vars(&["customer_name=Ana".to_string(), "note=a=b".to_string()]).unwrap();
        assert_eq!(vars["customer_name"], "Ana");
        assert_eq!(vars["note"], "a=b");
        assert!(parse_vars(&["broken".to_string()]).is_err());
    }
}
