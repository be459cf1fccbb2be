//! Built-in sender templates, in registration (and therefore matching) order.

use crate::error::RegistryError;
use crate::extract::{FieldDefault, Source};
use crate::handlers::{TaskSpec, Template};

fn empty() -> FieldDefault {
    FieldDefault::Literal(String::new())
}

/// A template whose task is a fixed heading, a reference URL, and the link.
fn statement(
    name: &str,
    subject: Subject<'_>,
    from: &str,
    heading: &str,
    context: &str,
    url: Option<&str>,
) -> Result<Template, RegistryError> {
    let builder = match subject {
        Subject::Is(s) => Template::builder(name).subject_is(s),
        Subject::Contains(s) => Template::builder(name).subject_contains(s),
        Subject::Matches(s) => Template::builder(name).subject_matches(s),
    };
    let mut task = TaskSpec::new(heading, context);
    if let Some(url) = url {
        task = task.text(url);
    }
    builder.from_is(from).task(task.link()).build()
}

enum Subject<'a> {
    Is(&'a str),
    Contains(&'a str),
    Matches(&'a str),
}

/// Every built-in template.
pub fn templates() -> Result<Vec<Template>, RegistryError> {
    Ok(vec![
        Template::builder("allstate-bill")
            .subject_is("Allstate: Your billing document is ready to view online")
            .from_is("Allstate My Account <allstate@trns01.allstate-email.com>")
            .field(
                "detail",
                empty(),
                &[(Source::Raw, r"(?s)(Policy Number:.*?Minimum Amount Due:.*?\n)")],
            )
            .task(
                TaskSpec::new("allstate bill available", "@quicken")
                    .field("detail")
                    .text("https://myaccount.allstate.com/anon/login/login.aspx")
                    .link(),
            )
            .build()?,
        statement(
            "chase-credit-card-statement",
            Subject::Matches(r"^Your credit card statement is (ready|available online)$"),
            "Chase <no-reply@alertsp.chase.com>",
            "chase credit card statement available",
            "chase:@quicken",
            Some("https://stmts.chase.com/stmtslist?AI=16258879"),
        )?,
        statement(
            "chase-mortgage-statement",
            Subject::Is("Your mortgage statement is available online."),
            "Chase <no-reply@alertsp.chase.com>",
            "chase mortgage statement available",
            "chase:@quicken",
            Some("https://stmts.chase.com/stmtslist?AI=475283320"),
        )?,
        Template::builder("capital-one-transfer")
            .subject_is("Transfer Money Notice")
            .from_contains("capitalone.com")
            .field(
                "detail",
                empty(),
                &[(Source::Raw, r"(?s)(Amount:.*?Transferred On:.*?\n)")],
            )
            .task(
                TaskSpec::new("capital one transfer money notice", "capitalone:@quicken")
                    .field("detail")
                    .link(),
            )
            .build()?,
        statement(
            "capital-one-statement",
            Subject::Contains("eStatement's now available"),
            "Capital One <capitalone@email.capitalone.com>",
            "account statement available",
            "capitalone:@quicken",
            Some("https://secure.capitalone360.com/myaccount/banking/login.vm"),
        )?,
        Template::builder("paypal-statement")
            .subject_contains("account statement is available")
            .from_is("PayPal Statements <paypal@e.paypal.com>")
            .field(
                "statement_url",
                FieldDefault::Unknown,
                &[(
                    Source::Part(vec![]),
                    r#"(?s)<a[^>]*?href="(.*?)"[^>]*>[^<]*?View Statement</a>"#,
                )],
            )
            .task(
                TaskSpec::new("account statement available", "paypal:@quicken")
                    .field("statement_url")
                    .link(),
            )
            .build()?,
        statement(
            "pershing-statement",
            Subject::Is("Account Statement Notification"),
            "pershing@advisor.netxinvestor.com",
            "account statement available",
            "pershing:@quicken",
            None,
        )?,
        statement(
            "pge-statement",
            Subject::Is("Your PG&E Energy Statement is Ready to View"),
            "CustomerServiceOnline@pge.com",
            "pg&e statement available",
            "amex:@quicken",
            Some("http://www.pge.com/MyEnergy"),
        )?,
        statement(
            "peets-reload",
            Subject::Contains("Your Peet's Card Reload Order"),
            "Customer Service <customerservice@peets.com>",
            "peet's card reload order",
            "amex:@quicken",
            Some("$50"),
        )?,
        statement(
            "comcast-bill",
            Subject::Is("Your bill is ready"),
            "XFINITY My Account <online.communications@alerts.comcast.net>",
            "comcast bill ready",
            "amex:@quicken",
            Some("https://customer.xfinity.com/Secure/MyAccount/"),
        )?,
        statement(
            "etrade-statement",
            Subject::Is("You have a new account statement from E*TRADE Securities"),
            "\"E*TRADE SECURITIES LLC\" <etrade_stmt_mbox@statement.etradefinancial.com>",
            "etrade statement available",
            "etrade:@quicken",
            Some("https://edoc.etrade.com/e/t/onlinedocs/docsearch?doc_type=stmt"),
        )?,
        statement(
            "amex-statement",
            Subject::Matches(r"Important Notice: Your .* Statement"),
            "American Express <AmericanExpress@welcome.aexp.com>",
            "account statement available",
            "amex:@quicken",
            Some(
                "https://online.americanexpress.com/myca/statementimage/us/welcome.do?request_type=authreg_StatementCycles&Face=en_US&sorted_index=0",
            ),
        )?,
        statement(
            "verizon-bill",
            Subject::Is("Your online bill is available."),
            "Verizon Wireless <VZWMail@ecrmemail.verizonwireless.com>",
            "verizon bill available",
            "amex:@quicken",
            Some(
                "https://ebillpay.verizonwireless.com/vzw/accountholder/mybill/BillingSummary.action",
            ),
        )?,
        statement(
            "amazon-subscribe-and-save",
            Subject::Is("Amazon Subscribe & Save: Review Your Monthly Delivery"),
            "\"Amazon Subscribe & Save\" <no-reply@amazon.com>",
            "review amazon subscribe and save delivery",
            "amazon:@home",
            Some("https://www.amazon.com/manageyoursubscription"),
        )?,
        Template::builder("amazon-order")
            .subject_contains("Your Amazon.com order")
            .from_is("\"auto-confirm@amazon.com\" <auto-confirm@amazon.com>")
            .field(
                "order",
                FieldDefault::Required,
                &[
                    (Source::Subject, r"Your Amazon\.com order of (.*)\."),
                    (Source::Part(vec![0]), r#"You ordered\s+(".*?")\s*\.\r?\n"#),
                ],
            )
            .field(
                "url",
                empty(),
                &[(
                    Source::Part(vec![0]),
                    r"View or manage your orders in Your Orders:\r?\n?(https:.*?)\r?\n",
                )],
            )
            .field(
                "delivery",
                FieldDefault::Unknown,
                &[
                    (
                        Source::Part(vec![0]),
                        r"Guaranteed delivery date:[ \t]*\r?\n\s*(.*?)\r?\n",
                    ),
                    (
                        Source::Part(vec![0]),
                        r"Estimated delivery date:[ \t]*\r?\n\s*(.*?)\r?\n",
                    ),
                    (Source::Part(vec![0]), r"Arriving:[ \t]*\r?\n\s*(.*?)\r?\n"),
                ],
            )
            .field(
                "total",
                empty(),
                &[(Source::Part(vec![0]), r"Order Total: (\$.*?)\r?\n")],
            )
            .task(
                TaskSpec::new("order of {order}", "amazon:@quicken")
                    .field("url")
                    .field("total")
                    .link(),
            )
            .task(
                TaskSpec::new("delivery of {order}", "amazon:@waiting")
                    .scheduled_from("delivery")
                    .field("url")
                    .link(),
            )
            .build()?,
        Template::builder("amazon-video-order")
            .subject_contains("Amazon.com order of")
            .from_is("\"Amazon.com\" <digital-no-reply@amazon.com>")
            .field(
                "order",
                FieldDefault::Required,
                &[(Source::Subject, r"Amazon\.com order of (.*)\.")],
            )
            .field(
                "total",
                empty(),
                &[(Source::Part(vec![0]), r"Grand Total:\s+(\$.*?)\r?\n")],
            )
            .task(
                TaskSpec::new("order of {order}", "amazon:@quicken")
                    .field("total")
                    .link(),
            )
            .build()?,
        statement(
            "vanguard-statement",
            Subject::Is("Your Vanguard statement is ready"),
            "Vanguard <ParticipantServices@vanguard.com>",
            "account statement available",
            "vanguard:@quicken",
            Some("https://retirementplans.vanguard.com/VGApp/pe/PublicHome"),
        )?,
        Template::builder("workday-feedback-request")
            .subject_is("Feedback is requested")
            .from_is("AutoNotification workday <autodesk@myworkday.com>")
            .field(
                "requester",
                FieldDefault::Required,
                &[(
                    Source::Part(vec![0, 0]),
                    r"<span>([^<].*?) \(\d+\) has requested that you provide feedback on",
                )],
            )
            .field(
                "employee",
                FieldDefault::Required,
                &[(
                    Source::Part(vec![0, 0]),
                    r"has requested that you provide feedback on (.*?) - Please visit your Workday inbox",
                )],
            )
            .field(
                "details_url",
                empty(),
                &[(
                    Source::Part(vec![0, 0]),
                    r#"<a href="(https://.*?)">Click Here to view the notification details"#,
                )],
            )
            .task(
                TaskSpec::new("provide feedback on {employee} to {requester}", "@work")
                    .field("details_url")
                    .link(),
            )
            .build()?,
    ])
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::extract::BodyNeed;
    use crate::handlers::{HandlerInput, HandlerRegistry};
    use crate::mailbox::{BodyPart, BodyView, Headers};
    use crate::task::Scheduled;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 12, 1).unwrap()
    }

    fn registry() -> HandlerRegistry {
        HandlerRegistry::with_builtin().unwrap()
    }

    fn headers(subject: &str, from: &str) -> Headers {
        Headers::new().with("Subject", subject).with("From", from)
    }

    fn run(name: &str, headers: &Headers, body: &BodyView) -> Vec<crate::task::TaskRecord> {
        let registry = registry();
        let handler = registry.find(headers).expect("a template should match");
        assert_eq!(handler.name(), name);
        handler
            .handle(&HandlerInput {
                message_id: "abc123",
                headers,
                body,
                link_base: "https://mail.google.com/mail/u/0/#inbox/",
                today: today(),
            })
            .unwrap()
            .tasks
    }

    #[test]
    fn all_builtin_templates_register() {
        let registry = registry();
        assert_eq!(registry.len(), 18);
        assert_eq!(registry.names()[0], "allstate-bill");
        assert_eq!(registry.names()[17], "workday-feedback-request");
    }

    #[test]
    fn chase_credit_card_statement() {
        let h = headers(
            "Your credit card statement is ready",
            "Chase <no-reply@alertsp.chase.com>",
        );
        let tasks = run("chase-credit-card-statement", &h, &BodyView::default());
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].heading, "chase credit card statement available");
        assert_eq!(tasks[0].context, "chase:@quicken");
        assert_eq!(tasks[0].priority, "#C");
        assert_eq!(tasks[0].scheduled, Scheduled::On(today()));
        assert_eq!(
            tasks[0].body,
            "https://stmts.chase.com/stmtslist?AI=16258879\nhttps://mail.google.com/mail/u/0/#inbox/abc123"
        );
    }

    #[test]
    fn chase_historical_subject_still_matches() {
        let h = headers(
            "Your credit card statement is available online",
            "Chase <no-reply@alertsp.chase.com>",
        );
        assert_eq!(
            registry().find(&h).map(|t| t.name().to_string()),
            Some("chase-credit-card-statement".to_string())
        );
    }

    #[test]
    fn capital_one_transfer_reads_raw_block() {
        let h = headers("Transfer Money Notice", "Capital One <alerts@capitalone.com>");
        let raw = "Subject: Transfer Money Notice\r\n\r\nAmount: $39.99\r\nFrom: Orange Parker Allowance, XXXXXX1099\r\nTo: Orange Checking, XXXXXX6515\r\nMemo: game\r\nTransferred On: 08/22/2015\r\nThank you\r\n";
        let tasks = run("capital-one-transfer", &h, &BodyView::from_raw(raw));
        assert_eq!(tasks[0].heading, "capital one transfer money notice");
        assert_eq!(
            tasks[0].body,
            "Amount: $39.99\nFrom: Orange Parker Allowance, XXXXXX1099\nTo: Orange Checking, XXXXXX6515\nMemo: game\nTransferred On: 08/22/2015\nhttps://mail.google.com/mail/u/0/#inbox/abc123"
        );
        assert!(!tasks[0].body.contains('\r'));
    }

    #[test]
    fn allstate_without_block_still_files() {
        let h = headers(
            "Allstate: Your billing document is ready to view online",
            "Allstate My Account <allstate@trns01.allstate-email.com>",
        );
        let tasks = run("allstate-bill", &h, &BodyView::from_raw("no detail here"));
        assert_eq!(
            tasks[0].body,
            "https://myaccount.allstate.com/anon/login/login.aspx\nhttps://mail.google.com/mail/u/0/#inbox/abc123"
        );
    }

    #[test]
    fn paypal_statement_link() {
        let h = headers(
            "Your May account statement is available",
            "PayPal Statements <paypal@e.paypal.com>",
        );
        let html = r#"<p>Hi</p><a class="btn" href="https://www.paypal.com/statements/42">View Statement</a>"#;
        let body = BodyView::from_root(BodyPart::leaf("text/html", html));
        let tasks = run("paypal-statement", &h, &body);
        assert_eq!(tasks[0].context, "paypal:@quicken");
        assert!(tasks[0].body.starts_with("https://www.paypal.com/statements/42\n"));
    }

    #[test]
    fn amex_subject_regex() {
        let h = headers(
            "Important Notice: Your Platinum Card Statement",
            "American Express <AmericanExpress@welcome.aexp.com>",
        );
        let tasks = run("amex-statement", &h, &BodyView::default());
        assert_eq!(tasks[0].heading, "account statement available");
    }

    #[test]
    fn pge_heading_keeps_ampersand() {
        let h = headers(
            "Your PG&E Energy Statement is Ready to View",
            "CustomerServiceOnline@pge.com",
        );
        let tasks = run("pge-statement", &h, &BodyView::default());
        assert_eq!(tasks[0].heading, "pg&e statement available");
        let decoded = urlencoding::decode(&tasks[0].capture_request().title).unwrap().into_owned();
        assert_eq!(decoded, "[#C] pg&e statement available  :amex:@quicken:");
    }

    fn amazon_body(delivery_block: &str) -> BodyView {
        let text = format!(
            "Hello,\r\nView or manage your orders in Your Orders:\r\nhttps://www.amazon.com/your-orders\r\n{delivery_block}Order Total: $24.99\r\n"
        );
        BodyView::from_root(BodyPart::container(
            "multipart/alternative",
            vec![
                BodyPart::leaf("text/plain", text),
                BodyPart::leaf("text/html", "<html></html>"),
            ],
        ))
    }

    fn amazon_headers() -> Headers {
        headers(
            "Your Amazon.com order of \"Rust in Action\".",
            "\"auto-confirm@amazon.com\" <auto-confirm@amazon.com>",
        )
    }

    #[test]
    fn amazon_order_files_purchase_and_delivery() {
        let body = amazon_body("Guaranteed delivery date:\r\n    Monday, December 21, 2020\r\n");
        let tasks = run("amazon-order", &amazon_headers(), &body);
        assert_eq!(tasks.len(), 2);

        assert_eq!(tasks[0].heading, "order of \"rust in action\"");
        assert_eq!(tasks[0].context, "amazon:@quicken");
        assert_eq!(
            tasks[0].body,
            "https://www.amazon.com/your-orders\n$24.99\nhttps://mail.google.com/mail/u/0/#inbox/abc123"
        );

        assert_eq!(tasks[1].heading, "delivery of \"rust in action\"");
        assert_eq!(tasks[1].context, "amazon:@waiting");
        assert_eq!(
            tasks[1].scheduled,
            Scheduled::On(NaiveDate::from_ymd_opt(2020, 12, 21).unwrap())
        );
    }

    #[test]
    fn amazon_estimated_date_used_when_no_guarantee() {
        let body = amazon_body("Estimated delivery date:\r\n    December 23, 2020\r\n");
        let tasks = run("amazon-order", &amazon_headers(), &body);
        assert_eq!(
            tasks[1].scheduled,
            Scheduled::On(NaiveDate::from_ymd_opt(2020, 12, 23).unwrap())
        );
    }

    #[test]
    fn amazon_arriving_window() {
        let body = amazon_body("Arriving:\r\n    Monday, December 21 - Wednesday, December 23\r\n");
        let tasks = run("amazon-order", &amazon_headers(), &body);
        assert_eq!(
            tasks[1].scheduled,
            Scheduled::Between(
                NaiveDate::from_ymd_opt(2020, 12, 21).unwrap(),
                NaiveDate::from_ymd_opt(2020, 12, 23).unwrap()
            )
        );
        assert_eq!(
            tasks[1].scheduled.to_string(),
            "<2020-12-21 Mon>--<2020-12-23 Wed>"
        );
    }

    #[test]
    fn amazon_without_delivery_date_schedules_today() {
        let tasks = run("amazon-order", &amazon_headers(), &amazon_body(""));
        assert_eq!(tasks[1].scheduled, Scheduled::On(today()));
    }

    #[test]
    fn amazon_order_name_falls_back_to_body() {
        let h = headers(
            "Your Amazon.com order #112-000",
            "\"auto-confirm@amazon.com\" <auto-confirm@amazon.com>",
        );
        let body = BodyView::from_root(BodyPart::container(
            "multipart/alternative",
            vec![BodyPart::leaf(
                "text/plain",
                "You ordered \"Socks\" and 2 more items.\r\n",
            )],
        ));
        let err = registry()
            .find(&h)
            .unwrap()
            .handle(&HandlerInput {
                message_id: "x",
                headers: &h,
                body: &body,
                link_base: "",
                today: today(),
            })
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::ExtractError::RequiredFieldMissing { .. }
        ));

        let body = BodyView::from_root(BodyPart::container(
            "multipart/alternative",
            vec![BodyPart::leaf("text/plain", "You ordered \"Socks\".\r\n")],
        ));
        let tasks = run("amazon-order", &h, &body);
        assert_eq!(tasks[0].heading, "order of \"socks\"");
    }

    #[test]
    fn amazon_video_order() {
        let h = headers(
            "Amazon.com order of The Matrix.",
            "\"Amazon.com\" <digital-no-reply@amazon.com>",
        );
        let body = BodyView::from_root(BodyPart::container(
            "multipart/alternative",
            vec![BodyPart::leaf("text/plain", "Grand Total:   $3.99\r\n")],
        ));
        let tasks = run("amazon-video-order", &h, &body);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].heading, "order of the matrix");
        assert!(tasks[0].body.starts_with("$3.99\n"));
    }

    #[test]
    fn workday_feedback_request() {
        let h = headers(
            "Feedback is requested",
            "AutoNotification workday <autodesk@myworkday.com>",
        );
        let html = concat!(
            "<p><span>Mark Davis (110932) has requested that you provide feedback on ",
            "Anthony Ruto - Please visit your Workday inbox</span></p>",
            "<a href=\"https://wd5.myworkday.com/n/123\">Click Here to view the notification details</a>",
        );
        let body = BodyView::from_root(BodyPart::container(
            "multipart/mixed",
            vec![BodyPart::container(
                "multipart/alternative",
                vec![BodyPart::leaf("text/html", html)],
            )],
        ));
        let tasks = run("workday-feedback-request", &h, &body);
        assert_eq!(tasks[0].heading, "provide feedback on anthony ruto to mark davis");
        assert_eq!(tasks[0].context, "@work");
        assert!(tasks[0].body.starts_with("https://wd5.myworkday.com/n/123\n"));
    }

    #[test]
    fn body_needs_match_sources() {
        let registry = registry();
        let need = |name: &str| registry.get(name).unwrap().body_need();
        assert_eq!(need("chase-credit-card-statement"), BodyNeed::None);
        assert_eq!(need("capital-one-transfer"), BodyNeed::Raw);
        assert_eq!(need("amazon-order"), BodyNeed::Decoded);
    }

    #[test]
    fn builtin_templates_do_not_overlap_on_their_own_headers() {
        let samples = [
            ("Transfer Money Notice", "Capital One <alerts@capitalone.com>"),
            (
                "Your May eStatement's now available",
                "Capital One <capitalone@email.capitalone.com>",
            ),
            (
                "Your Amazon.com order of Socks.",
                "\"auto-confirm@amazon.com\" <auto-confirm@amazon.com>",
            ),
            (
                "Amazon.com order of Socks.",
                "\"Amazon.com\" <digital-no-reply@amazon.com>",
            ),
            ("Your bill is ready", "XFINITY My Account <online.communications@alerts.comcast.net>"),
        ];
        let registry = registry();
        for (subject, from) in samples {
            assert_eq!(registry.all_matching(&headers(subject, from)).len(), 1, "{subject}");
        }
    }

    #[test]
    fn unknown_sender_matches_nothing() {
        let h = headers("Lunch?", "Friend <friend@example.com>");
        assert!(registry().find(&h).is_none());
    }
}
