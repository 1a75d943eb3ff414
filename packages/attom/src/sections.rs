//! Snapshot section decomposition.
//!
//! A full snapshot payload carries facts with very different half-lives:
//! physical characteristics barely change, distress signals age in days.
//! Each of the seven sections is normalized independently and returns
//! `None` when none of its candidate fields are present — callers use
//! section presence, not per-field presence, to decide whether to render a
//! block. Arrays are normalized element-wise and nulled out when empty.

use parcel_map_attom_models::{
    DistressFiling, DistressSection, MortgageRecord, MortgageSection, OwnershipSection,
    OwnershipTransfer, PhysicalSection, SaleEvent, SalesHistorySection, SnapshotSections,
    TaxSection, ValuationSection,
};
use serde_json::Value;

use crate::extract::{first_array, first_bool, first_f64, first_str};

/// Decomposes one property object into the seven independent sections.
#[must_use]
pub fn normalize_snapshot_sections(property: &Value) -> SnapshotSections {
    SnapshotSections {
        physical: physical(property),
        ownership: ownership(property),
        mortgage: mortgage(property),
        sales_history: sales_history(property),
        valuation: valuation(property),
        tax: tax(property),
        distress: distress(property),
    }
}

fn physical(p: &Value) -> Option<PhysicalSection> {
    let section = PhysicalSection {
        property_type: first_str(
            p,
            &["summary.proptype", "summary.propertyType", "proptype", "propertyType"],
        )
        .map(String::from),
        year_built: first_f64(
            p,
            &["summary.yearbuilt", "summary.yearBuilt", "building.summary.yearbuilteffective", "yearbuilt"],
        ),
        beds: first_f64(p, &["building.rooms.beds", "beds"]),
        baths: first_f64(
            p,
            &["building.rooms.bathstotal", "building.rooms.bathsTotal", "bathstotal", "baths"],
        ),
        square_feet: first_f64(
            p,
            &["building.size.universalsize", "building.size.livingsize", "squarefeet", "squareFeet"],
        ),
        lot_size_acres: first_f64(p, &["lot.lotsize1", "lot.lotSize1", "lot.acres"]),
        stories: first_f64(
            p,
            &["building.summary.storycount", "building.summary.levels", "stories"],
        ),
    };

    let present = section.property_type.is_some()
        || section.year_built.is_some()
        || section.beds.is_some()
        || section.baths.is_some()
        || section.square_feet.is_some()
        || section.lot_size_acres.is_some()
        || section.stories.is_some();
    present.then_some(section)
}

fn ownership(p: &Value) -> Option<OwnershipSection> {
    let chain = first_array(p, &["deedhistory", "deed.history", "ownershipTransfers"]).map(
        |entries| {
            entries
                .iter()
                .filter_map(ownership_transfer)
                .collect::<Vec<_>>()
        },
    );
    let chain = chain.filter(|c| !c.is_empty());

    // "OWNER OCCUPIED" / "ABSENTEE OWNER" status string, when present.
    let owner_occupied = first_bool(p, &["owner.ownerOccupied", "ownerOccupied"]).or_else(|| {
        first_str(p, &["summary.absenteeInd", "summary.absenteeind"])
            .map(|s| s.eq_ignore_ascii_case("owner occupied"))
    });

    let section = OwnershipSection {
        owner: first_str(p, &["owner.owner1.name", "owner.name", "ownerName"]).map(String::from),
        deed_type: first_str(p, &["deed.deedtype", "deed.deedType", "deedType"]).map(String::from),
        owner_occupied,
        chain,
    };

    let present = section.owner.is_some()
        || section.deed_type.is_some()
        || section.owner_occupied.is_some()
        || section.chain.is_some();
    present.then_some(section)
}

fn ownership_transfer(entry: &Value) -> Option<OwnershipTransfer> {
    let transfer = OwnershipTransfer {
        grantee: first_str(entry, &["grantee.name", "grantee"]).map(String::from),
        grantor: first_str(entry, &["grantor.name", "grantor"]).map(String::from),
        record_date: first_str(entry, &["recordingdate", "recordingDate", "recdate"])
            .map(String::from),
        deed_type: first_str(entry, &["deedtype", "deedType"]).map(String::from),
    };
    let present = transfer.grantee.is_some()
        || transfer.grantor.is_some()
        || transfer.record_date.is_some()
        || transfer.deed_type.is_some();
    present.then_some(transfer)
}

fn mortgage(p: &Value) -> Option<MortgageSection> {
    let mut records: Vec<MortgageRecord> =
        first_array(p, &["mortgagehistory", "mortgage.history", "financeHistory"])
            .map(|entries| entries.iter().filter_map(mortgage_record).collect())
            .unwrap_or_default();

    // Some endpoints carry a single current mortgage object instead of a
    // history array.
    if records.is_empty()
        && let Some(current) = p.get("mortgage").filter(|m| m.is_object())
        && let Some(record) = mortgage_record(current)
    {
        records.push(record);
    }

    (!records.is_empty()).then_some(MortgageSection { records })
}

fn mortgage_record(entry: &Value) -> Option<MortgageRecord> {
    let record = MortgageRecord {
        lender: first_str(entry, &["lender.lastname", "lender.name", "lender"]).map(String::from),
        amount: first_f64(entry, &["amount", "loanamount", "loanAmount"]),
        record_date: first_str(entry, &["recordingdate", "recordingDate", "date"])
            .map(String::from),
        loan_type: first_str(entry, &["loantype", "loanType"]).map(String::from),
    };
    let present = record.lender.is_some()
        || record.amount.is_some()
        || record.record_date.is_some()
        || record.loan_type.is_some();
    present.then_some(record)
}

fn sales_history(p: &Value) -> Option<SalesHistorySection> {
    let sales: Vec<SaleEvent> = first_array(p, &["salehistory", "saleHistory", "sales"])
        .map(|entries| entries.iter().filter_map(sale_event).collect())
        .unwrap_or_default();

    (!sales.is_empty()).then_some(SalesHistorySection { sales })
}

fn sale_event(entry: &Value) -> Option<SaleEvent> {
    let event = SaleEvent {
        price: first_f64(entry, &["amount.saleamt", "amount.saleAmt", "saleamt", "price"]),
        date: first_str(
            entry,
            &["amount.salerecdate", "salesearchdate", "saleTransDate", "date"],
        )
        .map(String::from),
        transaction_type: first_str(
            entry,
            &["amount.saletranstype", "saletranstype", "transactionType"],
        )
        .map(String::from),
    };
    let present = event.price.is_some() || event.date.is_some() || event.transaction_type.is_some();
    present.then_some(event)
}

fn valuation(p: &Value) -> Option<ValuationSection> {
    let section = ValuationSection {
        estimate: first_f64(p, &["avm.amount.value", "avm.amount", "avm"]),
        high: first_f64(p, &["avm.amount.high", "avmhigh", "avmHigh"]),
        low: first_f64(p, &["avm.amount.low", "avmlow", "avmLow"]),
        confidence: first_f64(p, &["avm.amount.scr", "avm.confidence", "avmConfidence"]),
        equity: first_f64(
            p,
            &[
                "homeEquity.estimatedAvailableEquity",
                "equity.estimatedAvailableEquity",
                "estimatedEquity",
            ],
        ),
    };

    let present = section.estimate.is_some()
        || section.high.is_some()
        || section.low.is_some()
        || section.confidence.is_some()
        || section.equity.is_some();
    present.then_some(section)
}

fn tax(p: &Value) -> Option<TaxSection> {
    let section = TaxSection {
        assessed_value: first_f64(
            p,
            &["assessment.assessed.assdttlvalue", "assessment.tax.assessedValue", "assessedValue"],
        ),
        market_value: first_f64(
            p,
            &["assessment.market.mktttlvalue", "assessment.tax.marketValue", "marketValue"],
        ),
        tax_amount: first_f64(
            p,
            &["assessment.tax.taxamt", "assessment.tax.taxAmt", "taxAmount"],
        ),
        tax_year: first_f64(
            p,
            &["assessment.tax.taxyear", "assessment.tax.taxYear", "taxYear"],
        ),
    };

    let present = section.assessed_value.is_some()
        || section.market_value.is_some()
        || section.tax_amount.is_some()
        || section.tax_year.is_some();
    present.then_some(section)
}

fn distress(p: &Value) -> Option<DistressSection> {
    let filings: Option<Vec<DistressFiling>> =
        first_array(p, &["foreclosure.filings", "foreclosures", "defaultHistory"])
            .map(|entries| entries.iter().filter_map(distress_filing).collect::<Vec<_>>())
            .filter(|f: &Vec<DistressFiling>| !f.is_empty());

    let in_default = first_bool(p, &["foreclosure.active", "inDefault", "indefault"]);

    let present = filings.is_some() || in_default.is_some();
    present.then_some(DistressSection { filings, in_default })
}

fn distress_filing(entry: &Value) -> Option<DistressFiling> {
    let filing = DistressFiling {
        filing_type: first_str(entry, &["documenttype", "documentType", "type"]).map(String::from),
        record_date: first_str(entry, &["recordingdate", "recordingDate", "date"])
            .map(String::from),
        amount: first_f64(
            entry,
            &["defaultamount", "defaultAmount", "judgmentamount", "amount"],
        ),
    };
    let present =
        filing.filing_type.is_some() || filing.record_date.is_some() || filing.amount.is_some();
    present.then_some(filing)
}
