use std::collections::{BTreeMap, HashMap};

pub const PLACEHOLDER_SID_PREFIX: &str = "HXxxxx";

#[derive(Debug, Clone)]
pub struct EmailTemplate {
    pub subject: &'static str,
    pub body: &'static str,
}

/// A WhatsApp content template registered with the vendor. `variables` lists
/// the placeholder names in positional order: the first name fills `{{1}}`.
#[derive(Debug, Clone)]
pub struct WhatsAppTemplate {
    pub content_sid: String,
    pub variables: Vec<&'static str>,
}

impl WhatsAppTemplate {
    pub fn is_configured(&self) -> bool {
        !self.content_sid.is_empty() && !self.content_sid.starts_with(PLACEHOLDER_SID_PREFIX)
    }
}

#[derive(Debug, Clone)]
pub struct MessageTemplate {
    pub key: &'static str,
    pub email: Option<EmailTemplate>,
    pub whatsapp: Option<WhatsAppTemplate>,
    pub sms: Option<&'static str>,
}

#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    templates: HashMap<&'static str, MessageTemplate>,
}

impl TemplateCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, template: MessageTemplate) {
        self.templates.insert(template.key, template);
    }

    pub fn get(&self, key: &str) -> Option<&MessageTemplate> {
        self.templates.get(key)
    }

    pub fn keys(&self) -> Vec<&'static str> {
        let mut keys: Vec<_> = self.templates.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    pub fn whatsapp_templates(&self) -> Vec<(&'static str, &WhatsAppTemplate)> {
        let mut out: Vec<_> = self
            .templates
            .values()
            .filter_map(|t| t.whatsapp.as_ref().map(|w| (t.key, w)))
            .collect();
        out.sort_unstable_by_key(|(key, _)| *key);
        out
    }

    /// The marketplace's message set. Content sids come from configuration;
    /// templates without one keep a placeholder sid and are rejected at dispatch.
    pub fn standard(content_sids: &BTreeMap<String, String>) -> Self {
        let sid = |key: &str| {
            content_sids
                .get(key)
                .cloned()
                .unwrap_or_else(|| format!("{}{}", PLACEHOLDER_SID_PREFIX, key))
        };

        let mut catalog = Self::new();
        catalog.insert(MessageTemplate {
            key: "booking_created",
            email: Some(EmailTemplate {
                subject: "New booking request #{booking_id}",
                body: "Hello {provider_name},\n\n{customer_name} requested {service_name} for {scheduled_at}.\nReview it at {booking_url}\n",
            }),
            whatsapp: Some(WhatsAppTemplate {
                content_sid: sid("booking_created"),
                variables: vec!["customer_name", "service_name", "scheduled_at", "booking_id"],
            }),
            sms: Some("New booking request: {customer_name} - {service_name} on {scheduled_at}. {booking_url}"),
        });
        catalog.insert(MessageTemplate {
            key: "booking_accepted",
            email: Some(EmailTemplate {
                subject: "Your booking #{booking_id} was accepted",
                body: "Hello {customer_name},\n\n{provider_name} accepted your {service_name} booking.\nComplete the payment at {booking_url}\n",
            }),
            whatsapp: Some(WhatsAppTemplate {
                content_sid: sid("booking_accepted"),
                variables: vec!["provider_name", "service_name", "booking_id"],
            }),
            sms: Some("{provider_name} accepted your {service_name} booking. Pay at {booking_url}"),
        });
        catalog.insert(MessageTemplate {
            key: "payment_approved",
            email: Some(EmailTemplate {
                subject: "Payment confirmed for booking #{booking_id}",
                body: "Hello,\n\nThe payment of ${amount} for {service_name} ({customer_name}) was confirmed.\nDetails: {booking_url}\n",
            }),
            whatsapp: Some(WhatsAppTemplate {
                content_sid: sid("payment_approved"),
                variables: vec!["customer_name", "service_name"],
            }),
            sms: Some("Payment confirmed: {customer_name} paid for {service_name}."),
        });
        catalog.insert(MessageTemplate {
            key: "payment_rejected",
            email: Some(EmailTemplate {
                subject: "Payment for booking #{booking_id} was not approved",
                body: "Hello {customer_name},\n\nWe could not confirm your payment for {service_name}: {reason}\nYou can try again at {booking_url}\n",
            }),
            whatsapp: None,
            sms: Some("Your payment for {service_name} was not approved: {reason}. {booking_url}"),
        });
        catalog.insert(MessageTemplate {
            key: "payment_proof_received",
            email: Some(EmailTemplate {
                subject: "We received your transfer for booking #{booking_id}",
                body: "Hello {customer_name},\n\nWe received your bank transfer proof for {service_name} (${amount}).\nOur team validates transfers within 1-4 business hours.\n",
            }),
            whatsapp: None,
            sms: None,
        });
        catalog.insert(MessageTemplate {
            key: "payment_pending_review",
            email: Some(EmailTemplate {
                subject: "New transfer to validate - booking #{booking_id}",
                body: "A bank transfer proof needs validation.\n\nBooking: {booking_id}\nCustomer: {customer_name}\nAmount: ${amount}\n",
            }),
            whatsapp: None,
            sms: None,
        });
        catalog.insert(MessageTemplate {
            key: "withdrawal_completed",
            email: Some(EmailTemplate {
                subject: "Your withdrawal was completed",
                body: "Hello {provider_name},\n\nYour withdrawal of ${amount} was transferred to your bank account.\n",
            }),
            whatsapp: None,
            sms: Some("Your withdrawal of ${amount} was completed."),
        });
        catalog.insert(MessageTemplate {
            key: "service_reminder",
            email: Some(EmailTemplate {
                subject: "Reminder: {service_name} at {scheduled_at}",
                body: "Your {service_name} service starts at {scheduled_at}.\n{booking_url}\n",
            }),
            whatsapp: Some(WhatsAppTemplate {
                content_sid: sid("service_reminder"),
                variables: vec!["service_name", "scheduled_at", "booking_id"],
            }),
            sms: Some("Reminder: your {service_name} service is at {scheduled_at}. {booking_url}"),
        });
        catalog.insert(MessageTemplate {
            key: "email_verification",
            email: Some(EmailTemplate {
                subject: "Verify your email address",
                body: "Hello {user_name},\n\nConfirm your email address using this link:\n{verification_url}\n\nThe link expires in 24 hours.\n",
            }),
            whatsapp: None,
            sms: None,
        });
        catalog.insert(MessageTemplate {
            key: "welcome",
            email: Some(EmailTemplate {
                subject: "Welcome!",
                body: "Hello {user_name},\n\nYour email is verified. Sign in at {login_url}\n",
            }),
            whatsapp: None,
            sms: None,
        });
        catalog
    }
}

/// Replaces `{name}` placeholders with values from `vars`. A placeholder with
/// no value is an error naming the placeholder.
pub fn render(text: &str, vars: &BTreeMap<String, String>) -> Result<String, String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) if is_placeholder(&after[..close]) => {
                let name = &after[..close];
                let value = vars.get(name).ok_or_else(|| name.to_string())?;
                out.push_str(value);
                rest = &after[close + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    Ok(out)
}

fn is_placeholder(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_lowercase() || c == '_')
}
