//! Transactional email templates.
//!
//! Pure functions of already-validated data; no I/O, fully unit-testable.
//! Copy is in Spanish, matching the product's audience.

use chrono::{DateTime, Utc};

use crate::ports::EmailMessage;

fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%d/%m/%Y").to_string()
}

fn format_amount(amount: f64, currency: &str) -> String {
    format!("{} {:.2}", currency, amount)
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<div style="font-family: sans-serif; max-width: 600px; margin: 0 auto;">
  <h2 style="color: #1a3c6e;">{title}</h2>
  {body}
  <p style="color: #888; font-size: 12px;">Aula Segura — Gestión de seguridad escolar</p>
</div>"#
    )
}

/// Subscription activated.
pub fn subscription_activated(
    to: &str,
    plan_name: &str,
    amount: f64,
    currency: &str,
    renewal_date: Option<&DateTime<Utc>>,
) -> EmailMessage {
    let renewal_line = match renewal_date {
        Some(date) => format!(
            "<p>Próxima renovación: <strong>{}</strong>.</p>",
            format_date(date)
        ),
        None => String::new(),
    };
    let body = format!(
        "<p>Tu suscripción al <strong>{}</strong> está activa.</p>\
         <p>Importe mensual: <strong>{}</strong>.</p>{}",
        plan_name,
        format_amount(amount, currency),
        renewal_line
    );
    EmailMessage {
        to: to.to_string(),
        subject: "Tu suscripción está activa".to_string(),
        html: layout("¡Suscripción activada!", &body),
    }
}

/// Payment receipt.
pub fn payment_receipt(to: &str, plan_name: &str, amount: f64, currency: &str) -> EmailMessage {
    let body = format!(
        "<p>Recibimos tu pago de <strong>{}</strong> por el <strong>{}</strong>.</p>\
         <p>¡Gracias por confiar en nosotros!</p>",
        format_amount(amount, currency),
        plan_name
    );
    EmailMessage {
        to: to.to_string(),
        subject: "Recibo de pago".to_string(),
        html: layout("Pago recibido", &body),
    }
}

/// Payment rejected; subscription paused.
pub fn payment_rejected(to: &str, plan_name: &str) -> EmailMessage {
    let body = format!(
        "<p>El cobro de tu suscripción al <strong>{}</strong> fue rechazado.</p>\
         <p>La suscripción quedó pausada. Actualizá tu medio de pago para reactivarla.</p>",
        plan_name
    );
    EmailMessage {
        to: to.to_string(),
        subject: "No pudimos procesar tu pago".to_string(),
        html: layout("Pago rechazado", &body),
    }
}

/// Subscription paused/suspended.
pub fn subscription_paused(to: &str, plan_name: &str) -> EmailMessage {
    let body = format!(
        "<p>Tu suscripción al <strong>{}</strong> fue pausada.</p>\
         <p>Podés reactivarla desde la sección de facturación.</p>",
        plan_name
    );
    EmailMessage {
        to: to.to_string(),
        subject: "Tu suscripción fue pausada".to_string(),
        html: layout("Suscripción pausada", &body),
    }
}

/// Subscription cancelled.
pub fn subscription_cancelled(to: &str, plan_name: &str) -> EmailMessage {
    let body = format!(
        "<p>Tu suscripción al <strong>{}</strong> fue cancelada.</p>\
         <p>Lamentamos verte partir. Podés volver a suscribirte cuando quieras.</p>",
        plan_name
    );
    EmailMessage {
        to: to.to_string(),
        subject: "Tu suscripción fue cancelada".to_string(),
        html: layout("Suscripción cancelada", &body),
    }
}

/// Plan changed (pending provider confirmation or already applied).
pub fn plan_changed(to: &str, new_plan_name: &str, amount: f64, currency: &str) -> EmailMessage {
    let body = format!(
        "<p>Tu plan fue actualizado al <strong>{}</strong>.</p>\
         <p>Nuevo importe mensual: <strong>{}</strong>.</p>",
        new_plan_name,
        format_amount(amount, currency)
    );
    EmailMessage {
        to: to.to_string(),
        subject: "Tu plan fue actualizado".to_string(),
        html: layout("Cambio de plan", &body),
    }
}
