//! Acknowledgement message template.

use std::path::PathBuf;

use crate::error::TemplateError;

/// Number of offer documents every acknowledgement carries.
pub const REQUIRED_ATTACHMENTS: usize = 3;

/// Greeting used when no personalized salutation is available.
pub const GENERIC_GREETING: &str = "Dzień dobry,";

const SUBJECT: &str = "FlexiHome \u{2013} komplet ofert i dokumentacja techniczna";

/// Subject and body of one acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailDraft {
    pub subject: String,
    pub body: String,
}

/// Validated template inputs shared by every lead of a pass.
#[derive(Debug, Clone)]
pub struct AcknowledgementTemplate {
    calendar_link: String,
    attachments: Vec<PathBuf>,
}

impl AcknowledgementTemplate {
    pub fn new(
        calendar_link: impl Into<String>,
        attachments: Vec<PathBuf>,
    ) -> Result<Self, TemplateError> {
        let calendar_link = calendar_link.into();
        if calendar_link.trim().is_empty() {
            return Err(TemplateError::EmptyCalendarLink);
        }
        if attachments.len() != REQUIRED_ATTACHMENTS {
            return Err(TemplateError::AttachmentCount {
                expected: REQUIRED_ATTACHMENTS,
                actual: attachments.len(),
            });
        }
        Ok(Self {
            calendar_link,
            attachments,
        })
    }

    /// The validated offer documents, in attachment order.
    pub fn attachments(&self) -> &[PathBuf] {
        &self.attachments
    }

    /// Compose the message for one lead.
    pub fn draft(&self, salutation: Option<&str>) -> EmailDraft {
        EmailDraft {
            subject: SUBJECT.to_string(),
            body: render_body(&greeting_line(salutation), &self.calendar_link),
        }
    }
}

/// `"Dzień dobry, Pani Anno,"`, or the generic greeting.
pub fn greeting_line(salutation: Option<&str>) -> String {
    match salutation.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => format!("Dzień dobry, {s},"),
        None => GENERIC_GREETING.to_string(),
    }
}

fn render_body(greeting: &str, calendar_link: &str) -> String {
    format!(
        "{greeting}

Dziękujemy za kontakt i zainteresowanie domami modułowymi FlexiHome.

Zakup domu to decyzja na lata \u{2013} dlatego stawiamy na pełną przejrzystość i konkrety już na etapie pierwszego kontaktu.

W załączeniu przesyłam 3 oferty zawierające szczegółowe informacje dotyczące naszych modeli domów wraz z zakresem realizacji.

Każdy dom realizujemy w standardzie \u{201e}pod klucz\u{201d} (bez mebli ruchomych), co oznacza, że otrzymują Państwo w pełni wykończony, gotowy do zamieszkania budynek \u{2013} bez ukrytych kosztów i niedomówień.

Nasza technologia oparta jest na rozwiązaniach zapewniających trwałość, komfort i zdrowy mikroklimat wewnętrzny:
\u{2013} dyfuzja pary wodnej i oddychająca konstrukcja ścian,
\u{2013} certyfikowane materiały konstrukcyjne wysokiej jakości,
\u{2013} podwyższona akustyka przegród,
\u{2013} kontrola wilgotności i stabilność parametrów powietrza,
\u{2013} wysoka bezwładność cieplna poprawiająca efektywność energetyczną.

W dokumentacji znajdą Państwo:
\u{2013} dokładny zakres prac,
\u{2013} specyfikację materiałową,
\u{2013} parametry techniczne,
\u{2013} warunki współpracy.

Jeśli chcieliby Państwo omówić szczegóły oraz dopasować model do swoich potrzeb, zapraszam do bezpośredniej rezerwacji rozmowy w kalendarzu:

{calendar_link}

To jedyna forma umawiania konsultacji \u{2013} po wybraniu terminu otrzymają Państwo automatyczne potwierdzenie spotkania.

Pozostaję do dyspozycji.
Z wyrazami szacunku,
Zespół FlexiHome
"
    )
}
