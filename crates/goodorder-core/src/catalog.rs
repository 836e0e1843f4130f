//! The static business-rule catalog.
//!
//! Each rule pairs a stable NIGO identifier with the full natural-language
//! condition to check and a short retrieval question used to pull
//! supporting context from the vector indexes. Rules are evaluated in
//! declared order; the chat pipeline stops at the first failure.

use serde::{Deserialize, Serialize};

use crate::form::FormType;

/// A single business rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Stable identifier, e.g. `REN.NM.004`.
    pub id: String,
    /// Full condition to check, phrased for the oracle.
    pub description: String,
    /// Short question used to retrieve supporting context per rule.
    pub retrieval_question: String,
}

impl Rule {
    pub fn new(id: &str, description: &str, retrieval_question: &str) -> Self {
        Self {
            id: id.to_string(),
            description: description.to_string(),
            retrieval_question: retrieval_question.to_string(),
        }
    }
}

/// Per-form-type rule lists, loaded once and never mutated. Safe for
/// unsynchronised concurrent reads.
#[derive(Debug, Clone)]
pub struct RuleCatalog {
    renewals: Vec<Rule>,
    withdrawals: Vec<Rule>,
}

impl RuleCatalog {
    /// The built-in catalog shipped with the system.
    pub fn builtin() -> Self {
        Self {
            renewals: renewal_rules(),
            withdrawals: withdrawal_rules(),
        }
    }

    /// Rules applicable to a form type, in evaluation order. Generic forms
    /// have no rules.
    pub fn rules_for(&self, form_type: FormType) -> &[Rule] {
        match form_type {
            FormType::Renewals => &self.renewals,
            FormType::Withdrawals => &self.withdrawals,
            FormType::Generic => &[],
        }
    }

    /// Flat rule descriptions for a form type, used by the batch
    /// validation path which checks all rules in a single oracle call.
    pub fn rule_texts_for(&self, form_type: FormType) -> Vec<String> {
        self.rules_for(form_type)
            .iter()
            .map(|r| r.description.clone())
            .collect()
    }
}

impl Default for RuleCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn renewal_rules() -> Vec<Rule> {
    vec![
        Rule::new(
            "REN.NM.004",
            "If Guarantee Period attribute is missing in ocr data, flag the form.",
            "What is Guarantee Period?",
        ),
        Rule::new(
            "REN.NM.001",
            "If the current guarantee period is not equal to 1 year, then check whether the \
             current period is one of 3, 4, or 5 and the requested guarantee period is one of \
             1, 3, 4, or 5. If this condition is not met, flag the form.",
            "What is Current Guarantee Period, Requested Guarantee Period?",
        ),
        Rule::new(
            "REN.NM.023",
            "After calling PolicyInfo API to retrieve LastAnniversaryDate, if it equals \
             2999-12-31T00:00:00, flag the form.",
            "What is LastAnniversaryDate?",
        ),
        Rule::new(
            "REN.NM.003",
            "Match for full name in db data and ocr data, if not present check first name \
             and last name against the ocr name else flag the form.",
            "What is FullName, FirstName, LastName?",
        ),
        Rule::new(
            "REN.NM.002",
            "If Contract Number attribute is missing in OCR data or does not match the value \
             from db data, flag the form.",
            "What is Contract Number?",
        ),
        Rule::new(
            "REN.NM.010",
            "If Contract Status is not valid per Ref_Contract, flag the form.",
            "What is Contract Status, Ref_Contract?",
        ),
        Rule::new(
            "REN.NM.006",
            "If the channel is not Phone and Signature is missing in ocr, flag the form.",
            "What is Channel, Signature?",
        ),
        Rule::new(
            "REN.NM.012",
            "If Contract PlanCode is not present or not configured in Ref_Product, flag the \
             form.",
            "What is Contract Plan Code, Ref_Product?",
        ),
        Rule::new(
            "REN.NM.013",
            "If Issue State is FL and the Owner/Annuitant's age is 65 or older at Issue Date, \
             flag the form.",
            "What is Issue State, Owner/Annuitant's Date of Birth, Issue Date?",
        ),
        Rule::new(
            "REN.NM.014",
            "If Issue State is MT and Issue Date is on or after 2018-01-01, flag the form.",
            "What is Issue State, Issue Date?",
        ),
        Rule::new(
            "REN.NM.015",
            "Compare Guarantee Period against allowed limit based on the 90th birthday of the \
             oldest owner/annuitant and 10 years after the Contract Issue Date; if outside the \
             allowed range, flag the form.",
            "What is Guarantee Period, Owner/Annuitant DOB, Contract Issue Date?",
        ),
        Rule::new(
            "REN.NM.016",
            "If the Date of Birth of the owner/annuitant is not available, flag the form.",
            "What is Owner/Annuitant DOB?",
        ),
        Rule::new(
            "REN.NM.017",
            "If one or more required fields (e.g., Owner Name, Joint Owner Name, Contract \
             Number, Guarantee Period, Signatures, Dates, Good Order Date, Case ID, Document \
             Number, renewalRequestSignDate, etc.) are missing, flag the form.",
            "What is Owner Name, Joint Owner Name, Contract Number, Guarantee Period, Case ID, \
             Document Number, renewalRequestSignDate?",
        ),
        Rule::new(
            "REN.NM.018",
            "If the channel is not Phone and Printed Name is missing, flag the form.",
            "What is Channel, Printed Name?",
        ),
        Rule::new(
            "REN.NM.019",
            "If the contract is trust-owned and Title is missing, flag the form.",
            "What is Ownership Type, Title?",
        ),
        Rule::new(
            "REN.NM.020",
            "If a transaction on Anniversary is detected via LifeCad API, flag the form.",
            "What is Transaction on Anniversary?",
        ),
        Rule::new(
            "REN.NM.024",
            "For client MASS, if Sign Date is outside the allowed stale period (per \
             Ref_StalePeriod), flag the form.",
            "What is Client Type, Signature Date, Ref_StalePeriod?",
        ),
        Rule::new(
            "REN.NM.022",
            "For clients other than MASS, if the stale period condition is not met, flag the \
             form.",
            "What is Client Type, Stale Period, Ref_StalePeriod?",
        ),
        Rule::new(
            "REN.NM.025",
            "For Issue State NY and renewal periods 3, 4, or 5, if the External ID is invalid \
             in the LI State Requirement Review, flag the form.",
            "What is Issue State, Renewal Period, External ID in LI State Requirement Review?",
        ),
        Rule::new(
            "REN.NM.034",
            "Compare the account code from accountQuote with the getTransactionDetails API; \
             if Next Anniversary Date does not match tdRnewDate, flag the form.",
            "What is Account Code, Next Anniversary Date, tdRnewDate?",
        ),
    ]
}

fn withdrawal_rules() -> Vec<Rule> {
    vec![
        Rule::new(
            "WDL.NM.001",
            "Minimum age for loan application is 21 years; if the applicant is younger, flag \
             the form.",
            "What is Age?",
        ),
        Rule::new(
            "WDL.NM.002",
            "Income verification must be present; if missing, flag the form.",
            "What is Income?",
        ),
        Rule::new(
            "WDL.NM.003",
            "Contact information fields must be filled; if any is empty, flag the form.",
            "What is Contact Phone, Contact Address?",
        ),
        Rule::new(
            "WDL.NM.004",
            "Loan amount must be specified and within valid range; otherwise flag the form.",
            "What is Loan Amount?",
        ),
    ]
}
