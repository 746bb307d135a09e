use serde_json::Value;
use tripboard::board::{self, Board};
use tripboard::models::pipeline::StepDirection;
use tripboard::models::trip::{self, RawRecord};

fn row(fields: &[(&str, &str)]) -> RawRecord {
    fields
        .iter()
        .map(|(key, value)| (key.to_string(), Value::String(value.to_string())))
        .collect()
}

fn sheet_row(id: &str, status: &str) -> RawRecord {
    row(&[("Trip ID", id), ("Trip Verification Status", status)])
}

#[test]
fn import_seeds_new_trips_from_their_verification_status() {
    let mut board = Board::new();
    let summary = board.reconcile(&[sheet_row("T-1", "TX Approved")]);
    assert_eq!(summary.imported, 1);
    assert_eq!(summary.skipped, 0);
    let trip = board.find("T-1").unwrap();
    assert_eq!(trip.original_status, "TX Approved");
    assert_eq!(trip.board_status, "TX Approved");
    assert_eq!(trip.assigned_to, "");
}

#[test]
fn reimport_preserves_board_status_assignee_and_notes() {
    let mut board = Board::new();
    board.reconcile(&[row(&[
        ("Trip ID", "T-1"),
        ("Trip Verification Status", "Pending Verification"),
        ("Notes", "priority shipment"),
    ])]);
    board.move_trip("T-1", "TA Completed").unwrap();
    board.assign_trip("T-1", "Caz").unwrap();

    board.reconcile(&[row(&[
        ("Trip ID", "T-1"),
        ("Trip Verification Status", "TX Approved"),
        ("Notes", "   "),
    ])]);

    let trip = board.find("T-1").unwrap();
    assert_eq!(trip.board_status, "TA Completed");
    assert_eq!(trip.assigned_to, "Caz");
    assert_eq!(trip.original_status, "TX Approved");
    assert_eq!(trip.notes.as_deref(), Some("priority shipment"));
}

#[test]
fn reimport_with_real_notes_overwrites_the_old_ones() {
    let mut board = Board::new();
    board.reconcile(&[row(&[("Trip ID", "T-1"), ("Notes", "old note")])]);
    board.reconcile(&[row(&[("Trip ID", "T-1"), ("Notes", "updated routing")])]);
    assert_eq!(
        board.find("T-1").unwrap().notes.as_deref(),
        Some("updated routing")
    );
}

#[test]
fn reconcile_twice_with_same_rows_is_idempotent() {
    let rows = vec![
        sheet_row("T-1", "TX Approved"),
        sheet_row("T-2", "Pending Verification"),
    ];
    let mut board = Board::new();
    board.reconcile(&rows);
    board.move_trip("T-2", "Bundle Completed").unwrap();
    let before = board.trips().to_vec();
    board.reconcile(&rows);
    assert_eq!(board.trips(), before.as_slice());
}

#[test]
fn rows_without_an_id_are_skipped_and_counted() {
    let mut board = Board::new();
    let summary = board.reconcile(&[
        sheet_row("T-1", "TX Approved"),
        row(&[("Trip ID", "   "), ("Traveler", "nobody")]),
        row(&[("Traveler", "still nobody")]),
    ]);
    assert_eq!(summary.imported, 1);
    assert_eq!(summary.skipped, 2);
    assert_eq!(board.len(), 1);
}

#[test]
fn trips_absent_from_a_reimport_are_dropped() {
    let mut board = Board::new();
    board.reconcile(&[
        sheet_row("T-1", "TX Approved"),
        sheet_row("T-2", "Pending Verification"),
    ]);
    board.reconcile(&[sheet_row("T-2", "Pending Verification")]);
    assert_eq!(board.len(), 1);
    assert!(board.find("T-1").is_none());
}

#[test]
fn duplicate_ids_keep_first_position_and_last_values() {
    let mut board = Board::new();
    let summary = board.reconcile(&[
        sheet_row("T-1", "Pending Verification"),
        sheet_row("T-2", "Pending Verification"),
        row(&[
            ("Trip ID", "T-1"),
            ("Trip Verification Status", "TX Approved"),
            ("Traveler", "Dana"),
        ]),
    ]);
    assert_eq!(summary.imported, 2);
    let first = &board.trips()[0];
    assert_eq!(first.trip_id, "T-1");
    assert_eq!(first.original_status, "TX Approved");
    assert_eq!(first.traveler.as_deref(), Some("Dana"));
    assert_eq!(board.trips()[1].trip_id, "T-2");
}

#[test]
fn import_order_is_preserved() {
    let mut board = Board::new();
    board.reconcile(&[
        sheet_row("T-3", "TX Approved"),
        sheet_row("T-1", "TX Approved"),
        sheet_row("T-2", "TX Approved"),
    ]);
    let ids: Vec<&str> = board
        .trips()
        .iter()
        .map(|trip| trip.trip_id.as_str())
        .collect();
    assert_eq!(ids, vec!["T-3", "T-1", "T-2"]);
}

#[test]
fn unknown_statuses_are_kept_but_canonicalize_to_the_first_stage() {
    let mut board = Board::new();
    board.reconcile(&[sheet_row("T-1", "Mystery State")]);
    let trip = board.find("T-1").unwrap();
    assert_eq!(trip.board_status, "Mystery State");
    assert_eq!(trip.stage(), "Pending Verification");
    assert_eq!(trip.stage_index(), 0);
}

#[test]
fn moving_to_an_unknown_stage_lands_on_the_first_stage() {
    let mut board = Board::new();
    board.reconcile(&[sheet_row("T-1", "TX Approved")]);
    board.move_trip("T-1", "Not A Column").unwrap();
    assert_eq!(
        board.find("T-1").unwrap().board_status,
        "Pending Verification"
    );
}

#[test]
fn moving_an_unknown_trip_reports_nothing() {
    let mut board = Board::new();
    board.reconcile(&[sheet_row("T-1", "TX Approved")]);
    assert!(board.move_trip("T-9", "TX Approved").is_none());
}

#[test]
fn stepping_clamps_at_both_ends() {
    let mut board = Board::new();
    board.reconcile(&[sheet_row("T-1", "Pending Verification")]);
    board.step_trip("T-1", StepDirection::Prev).unwrap();
    assert_eq!(
        board.find("T-1").unwrap().board_status,
        "Pending Verification"
    );
    board.move_trip("T-1", "Bundle Completed").unwrap();
    board.step_trip("T-1", StepDirection::Next).unwrap();
    assert_eq!(board.find("T-1").unwrap().board_status, "Bundle Completed");
}

#[test]
fn stepping_moves_one_stage_at_a_time() {
    let mut board = Board::new();
    board.reconcile(&[sheet_row("T-1", "TA In Progress")]);
    board.step_trip("T-1", StepDirection::Next).unwrap();
    assert_eq!(board.find("T-1").unwrap().board_status, "TA Completed");
    board.step_trip("T-1", StepDirection::Prev).unwrap();
    board.step_trip("T-1", StepDirection::Prev).unwrap();
    assert_eq!(board.find("T-1").unwrap().board_status, "TX Approved");
}

#[test]
fn stepping_an_unknown_status_starts_from_the_first_stage() {
    let mut board = Board::new();
    board.reconcile(&[sheet_row("T-1", "Mystery State")]);
    board.step_trip("T-1", StepDirection::Next).unwrap();
    assert_eq!(board.find("T-1").unwrap().board_status, "TX Approved");
}

#[test]
fn legacy_current_status_fills_both_statuses() {
    let mut board = Board::new();
    board.reconcile(&[row(&[("Trip ID", "T-1"), ("currentStatus", "TA Completed")])]);
    let trip = board.find("T-1").unwrap();
    assert_eq!(trip.original_status, "TA Completed");
    assert_eq!(trip.board_status, "TA Completed");
    assert!(trip.extra.is_empty());
}

#[test]
fn missing_statuses_default_to_the_first_stage() {
    let mut board = Board::new();
    board.reconcile(&[row(&[("Trip ID", "T-1")])]);
    let trip = board.find("T-1").unwrap();
    assert_eq!(trip.original_status, "Pending Verification");
    assert_eq!(trip.board_status, "Pending Verification");
}

#[test]
fn unrecognized_columns_pass_through() {
    let mut board = Board::new();
    board.reconcile(&[row(&[("Trip ID", "T-1"), ("Carrier", "DHL")])]);
    let trip = board.find("T-1").unwrap();
    assert_eq!(
        trip.extra.get("Carrier"),
        Some(&Value::String("DHL".into()))
    );
}

#[test]
fn stage_summaries_sum_lenient_quantities() {
    let mut board = Board::new();
    board.reconcile(&[
        row(&[
            ("Trip ID", "T-1"),
            ("Trip Verification Status", "TX Approved"),
            ("Items Accepted", "12 pcs"),
            ("Weight", "30.5kg"),
        ]),
        row(&[
            ("Trip ID", "T-2"),
            ("Trip Verification Status", "TX Approved"),
            ("Items Accepted", "n/a"),
            ("Weight", "8"),
        ]),
    ]);
    let stages = board::stage_summaries(board.trips());
    assert_eq!(stages.len(), 6);
    assert_eq!(stages[0].stage, "Pending Verification");
    assert_eq!(stages[0].trips, 0);
    let tx = &stages[1];
    assert_eq!(tx.stage, "TX Approved");
    assert_eq!(tx.trips, 2);
    assert_eq!(tx.items, 12);
    assert!((tx.weight - 38.5).abs() < 1e-9);
}

#[test]
fn totals_track_special_destinations_and_pending_items() {
    let mut board = Board::new();
    board.reconcile(&[
        row(&[
            ("Trip ID", "T-1"),
            ("USA Dest", "NY"),
            ("Trip Verification Status", "Pending Verification"),
            ("Items Accepted", "12"),
        ]),
        row(&[
            ("Trip ID", "T-2"),
            ("USA Dest", "AZ"),
            ("Trip Verification Status", "TX Approved"),
            ("Items Accepted", "4"),
        ]),
        row(&[
            ("Trip ID", "T-3"),
            ("USA Dest", "nv"),
            ("Trip Verification Status", "Bundling In Progress"),
            ("Items Accepted", "3"),
        ]),
    ]);
    let totals = board::totals(board.trips());
    assert_eq!(totals.trips, 3);
    assert_eq!(totals.items, 19);
    assert_eq!(totals.special_destination_trips, 2);
    assert_eq!(totals.ready_to_process_items, 12);
}

#[test]
fn totals_split_approved_from_pending_and_count_ambassadors() {
    let mut board = Board::new();
    board.reconcile(&[
        row(&[
            ("Trip ID", "T-1"),
            ("Traveler", "Veronica Endara"),
            ("Trip Verification Status", "TX Approved"),
        ]),
        row(&[
            ("Trip ID", "T-2"),
            ("Traveler", "Marcus Webb"),
            ("Trip Verification Status", "Pending Verification"),
        ]),
        row(&[
            ("Trip ID", "T-3"),
            ("Traveler", "Sra. Delia Vera (cargo)"),
            ("Trip Verification Status", "Mystery State"),
        ]),
        row(&[("Trip ID", "T-4"), ("boardStatus", "tx approved")]),
    ]);
    let totals = board::totals(board.trips());
    assert_eq!(totals.trips, 4);
    assert_eq!(totals.approved_trips, 2);
    assert_eq!(totals.pending_trips, 2);
    assert_eq!(totals.ambassador_trips, 2);
}

#[test]
fn lenient_parsers_take_numeric_prefixes() {
    assert_eq!(trip::lenient_int("12 pcs"), Some(12));
    assert_eq!(trip::lenient_int(" -4"), Some(-4));
    assert_eq!(trip::lenient_int("+7"), Some(7));
    assert_eq!(trip::lenient_int("3.9"), Some(3));
    assert_eq!(trip::lenient_int("abc"), None);
    assert_eq!(trip::lenient_int(""), None);
    assert_eq!(trip::lenient_float("30.5kg"), Some(30.5));
    assert_eq!(trip::lenient_float(".5"), Some(0.5));
    assert_eq!(trip::lenient_float("-2.25 lbs"), Some(-2.25));
    assert_eq!(trip::lenient_float("1.2.3"), Some(1.2));
    assert_eq!(trip::lenient_float("kg"), None);
}

#[test]
fn csv_records_tolerate_ragged_rows_and_blank_lines() {
    let sheet = "Trip ID,Traveler,USA Dest\nT-1,Gabriela,NY\n\nT-2,Marcus\nT-3,Lena,CO,extra\n";
    let rows = trip::records_from_csv(sheet).unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(
        rows[1].get("Traveler"),
        Some(&Value::String("Marcus".into()))
    );
    assert!(rows[1].get("USA Dest").is_none());
    // the fourth field of the long row has no header and is dropped
    assert_eq!(rows[2].len(), 3);
}

#[test]
fn csv_quoted_fields_keep_commas() {
    let sheet = "Trip ID,Notes\nT-1,\"fragile, keep upright\"\n";
    let rows = trip::records_from_csv(sheet).unwrap();
    assert_eq!(
        rows[0].get("Notes"),
        Some(&Value::String("fragile, keep upright".into()))
    );
}
