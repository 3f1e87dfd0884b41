use esg_peer_core::compliance::esrs::{
    check_esrs_disclosures, generate_csrd_summary, read_disclosure_rows, ComplianceLevel,
    ComplianceStatus, EsrsCheckInput,
};
use esg_peer_core::compliance::rules::{
    check_compliance_rows, compliance_rules, read_compliance_rows, ComplianceCheckInput,
};
use pretty_assertions::assert_eq;

// ===========================================================================
// Product rule checks
// ===========================================================================

#[test]
fn test_rule_table_regulations() {
    let regs: Vec<&str> = compliance_rules().iter().map(|r| r.regulation).collect();
    assert_eq!(
        regs,
        vec![
            "ESRS E1 §47",
            "SFDR Art. 4",
            "IFRS S2 – Governance",
            "EU Taxonomy Art. 8"
        ]
    );
}

#[test]
fn test_fund_table_from_csv() {
    let data = "\
Fund,Product_Type,GHG_Emissions_Scope_3,Principal_Adverse_Impacts_Disclosed,Board_Climate_Oversight,Green_Taxonomy_Alignment (%)
Green Growth,Article 9,54000,Yes,Yes,61%
Core Equity,Article 6,,No,No,0.12
";
    let rows = read_compliance_rows(data.as_bytes()).unwrap();
    let out = check_compliance_rows(&ComplianceCheckInput { rows }).unwrap();
    let rows = &out.result.rows;

    assert_eq!(rows[0].results.len(), 4);
    assert_eq!(rows[0].failed, 0);

    // Article 6 only sees the two universal rules, and fails both.
    assert_eq!(rows[1].results.len(), 2);
    assert_eq!(rows[1].failed, 2);
    assert_eq!(
        rows[1].results[1].regulation.as_deref(),
        Some("EU Taxonomy Art. 8")
    );
    assert_eq!(out.result.total_failed, 2);
    assert!(out.warnings.is_empty());
}

// ===========================================================================
// ESRS checklist and CSRD summary
// ===========================================================================

const QUESTIONNAIRE: &str = "\
Disclosure ID,Section,Response Type
ESRS 2-GOV-1,Governance,Yes
ESRS 2-GOV-2,Governance,None
ESRS 2-SBM-3,Strategy,Yes
ESRS 2-SBM-3a,Strategy,Not yet conducted
ESRS E1-6,Environment,nan
ESRS E1-4,Environment,Yes
ESRS E2-3,Environment,Yes
ESRS S1-6,Social,41.5
ESRS G1-1,Governance,Yes
ESRS 2-IRO-1,Strategy,Yes
Internal-7,Other,Yes
";

#[test]
fn test_questionnaire_statuses() {
    let rows = read_disclosure_rows(QUESTIONNAIRE.as_bytes()).unwrap();
    let out = check_esrs_disclosures(&EsrsCheckInput { rows }).unwrap();
    assert_eq!(out.result.compliant, 7);
    assert_eq!(out.result.non_compliant, 3);
    assert_eq!(out.result.not_applicable, 1);
    assert_eq!(out.result.results[10].status, ComplianceStatus::NotApplicable);
    assert_eq!(out.warnings.len(), 1);
}

#[test]
fn test_csrd_summary_moderate() {
    let rows = read_disclosure_rows(QUESTIONNAIRE.as_bytes()).unwrap();
    let out = generate_csrd_summary(&EsrsCheckInput { rows }).unwrap();
    let s = &out.result;
    assert_eq!(s.compliant_count, 7);
    assert_eq!(s.total_checks, 10);
    assert_eq!(s.level, ComplianceLevel::Moderate);
    assert_eq!(s.overall_status, "partially compliant");
    assert_eq!(s.sections, vec!["Environment", "Governance", "Social", "Strategy"]);
    assert!(s.narrative.contains("7 out of 10"));
    assert!(s.narrative.contains("missing data"));
    assert!(s.narrative.contains("Annually, Biennially"));
}
