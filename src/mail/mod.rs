//! Outgoing mail through the web's `SP.Utilities.Utility.SendEmail` utility.
//!
//! SharePoint only delivers to recipients it can resolve as site users; the
//! client does not validate addresses beyond splitting the recipient list.

use serde_json::{json, Value as JsonValue};

use crate::client::SharePointClient;
use crate::error::{invalid_argument, SharePointResult};
use crate::lists::{EntityPayload, EntityType};
use crate::transport::{HttpRequest, HttpVerb};

#[derive(Clone, Debug)]
pub struct MailClient {
    client: SharePointClient,
}

impl MailClient {
    pub(crate) fn new(client: SharePointClient) -> Self {
        Self { client }
    }

    /// Sends a message to the comma separated recipients in `to`.
    pub async fn send_mail(
        &self,
        to: &str,
        from: &str,
        subject: &str,
        body: &str,
    ) -> SharePointResult<()> {
        let recipients = split_recipients(to);
        if recipients.is_empty() {
            return Err(invalid_argument("At least one mail recipient is required"));
        }
        let url = format!(
            "{}/SP.Utilities.Utility.SendEmail",
            self.client.location().api_root()
        );
        let request =
            HttpRequest::new(HttpVerb::Post, url).with_json(email_body(&recipients, from, subject, body));
        self.client.execute(request).await?;
        log::debug!("mail '{subject}' sent to {} recipient(s)", recipients.len());
        Ok(())
    }
}

fn split_recipients(to: &str) -> Vec<String> {
    to.split(',')
        .map(str::trim)
        .filter(|recipient| !recipient.is_empty())
        .map(str::to_string)
        .collect()
}

fn email_body(recipients: &[String], from: &str, subject: &str, body: &str) -> JsonValue {
    let properties = EntityPayload::new(EntityType::EmailProperties)
        .field("To", json!({ "results": recipients }))
        .field("From", from)
        .field("Subject", subject)
        .field("Body", body);
    json!({ "properties": properties.to_body() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::FormDigest;
    use crate::error::SharePointErrorCode;
    use crate::test_support::{client_for, client_for_server, start_mock_server};
    use crate::transport::InMemoryBackend;
    use futures::executor::block_on;
    use httpmock::prelude::*;
    use std::panic::{self, AssertUnwindSafe};

    #[test]
    fn recipients_are_trimmed_and_blank_entries_dropped() {
        assert_eq!(
            split_recipients(" a@contoso.com,, b@contoso.com ,"),
            vec!["a@contoso.com", "b@contoso.com"]
        );
        assert!(split_recipients(" , ").is_empty());
    }

    #[test]
    fn empty_recipient_list_is_rejected_before_sending() {
        let backend = InMemoryBackend::new();
        let client = client_for(&backend);
        let err = block_on(client.mail().send_mail(" ", "me@contoso.com", "s", "b")).unwrap_err();
        assert_eq!(err.code, SharePointErrorCode::InvalidArgument);
        assert!(backend.requests().is_empty());
    }

    #[tokio::test]
    async fn send_mail_posts_email_properties() {
        let Ok(server) = panic::catch_unwind(AssertUnwindSafe(start_mock_server)) else {
            eprintln!("Skipping send_mail_posts_email_properties: unable to start mock server");
            return;
        };
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/_api/SP.Utilities.Utility.SendEmail")
                .header("X-RequestDigest", "0xMAIL")
                .header("Content-Type", "application/json;odata=verbose")
                .json_body(json!({
                    "properties": {
                        "__metadata": { "type": "SP.Utilities.EmailProperties" },
                        "To": { "results": ["a@contoso.com", "b@contoso.com"] },
                        "From": "noreply@contoso.com",
                        "Subject": "Weekly report",
                        "Body": "<p>Attached.</p>"
                    }
                }));
            then.status(200).json_body(json!({ "d": { "SendEmail": null } }));
        });

        let client = client_for_server(&server);
        client.digest().seed(FormDigest::new("0xMAIL"));
        client
            .mail()
            .send_mail(
                "a@contoso.com, b@contoso.com",
                "noreply@contoso.com",
                "Weekly report",
                "<p>Attached.</p>",
            )
            .await
            .unwrap();

        mock.assert_async().await;
    }
}
