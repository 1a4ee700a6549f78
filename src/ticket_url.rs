// qr-labels: deep links to the ticketing form

use crate::error::AppError;
use crate::inventory::{Row, CATEGORY_COLUMN, MEETING_ROOM};
use url::Url;

/// Ticket form every QR code points at unless overridden
pub const DEFAULT_TICKET_ENDPOINT: &str = "https://apps-hrc.adi.adies.lan/mailer/new-ticket";

/// Build the URL encoded in a row's QR code.
///
/// The query starts with `Catégorie=Salle de Réunion`; every column of `row`
/// is then added, and a row carrying its own `Catégorie` overwrites the
/// default in place. Values are form-urlencoded as UTF-8.
pub fn build_url(endpoint: &str, row: &Row) -> Result<String, AppError> {
    let mut params: Vec<(&str, &str)> = vec![(CATEGORY_COLUMN, MEETING_ROOM)];

    for (column, value) in row.iter() {
        match params.iter_mut().find(|(name, _)| *name == column) {
            Some(param) => param.1 = value,
            None => params.push((column, value)),
        }
    }

    let url = Url::parse_with_params(endpoint, &params)
        .map_err(|e| AppError::UrlError(format!("{}: {}", endpoint, e)))?;
    Ok(url.into())
}
