//! Canonical schemas for every dataset category the pipeline publishes.

use crate::schema::{FieldSpec, Schema};

// ── Casualty / infrastructure service ─────────────────────────

pub const CASUALTIES: Schema = Schema {
    name: "casualties",
    date_fields: &["report_date", "Date"],
    fields: &[
        FieldSpec::count("killed", &["Killed", "ext_killed"]),
        FieldSpec::count("killed_cum", &["ext_killed_cum", "Killed_cum"]),
        FieldSpec::count("injured", &["Injured", "ext_injured"]),
        FieldSpec::count("injured_cum", &["ext_injured_cum"]),
        FieldSpec::count(
            "children_killed_cum",
            &["killed_children_cum", "ext_killed_children_cum"],
        ),
        FieldSpec::count(
            "women_killed_cum",
            &["killed_women_cum", "ext_killed_women_cum"],
        ),
        FieldSpec::count("press_killed_cum", &["ext_press_killed_cum"]),
        FieldSpec::count(
            "medical_killed_cum",
            &["med_killed_cum", "ext_med_killed_cum"],
        ),
        FieldSpec::count(
            "civil_defence_killed_cum",
            &["civdef_killed_cum", "ext_civdef_killed_cum"],
        ),
        FieldSpec::count("massacres_cum", &["massacres"]),
        FieldSpec::category("report_source", &["source"]),
    ],
};

pub const WEST_BANK: Schema = Schema {
    name: "westbank",
    date_fields: &["report_date"],
    fields: &[
        FieldSpec::count("killed_cum", &["verified.killed_cum", "ext_killed_cum"]),
        FieldSpec::count(
            "children_killed_cum",
            &["verified.killed_children_cum", "killed_children_cum"],
        ),
        FieldSpec::count("injured_cum", &["verified.injured_cum", "ext_injured_cum"]),
        FieldSpec::count(
            "children_injured_cum",
            &["verified.injured_children_cum", "injured_children_cum"],
        ),
        FieldSpec::count(
            "settler_attacks_cum",
            &["settler_attacks_cum", "flash_settler_attacks_cum"],
        ),
        FieldSpec::category("report_source", &["source"]),
    ],
};

pub const INFRASTRUCTURE: Schema = Schema {
    name: "infrastructure",
    date_fields: &["report_date"],
    fields: &[
        FieldSpec::count(
            "residential_destroyed",
            &["residential.destroyed", "residential.ext_destroyed"],
        ),
        FieldSpec::count(
            "civic_buildings_destroyed",
            &[
                "civic_buildings.destroyed",
                "civic_buildings.ext_destroyed",
            ],
        ),
        FieldSpec::count(
            "schools_destroyed",
            &[
                "educational_buildings.destroyed",
                "educational_buildings.ext_destroyed",
            ],
        ),
        FieldSpec::count(
            "schools_damaged",
            &[
                "educational_buildings.damaged",
                "educational_buildings.ext_damaged",
            ],
        ),
        FieldSpec::count(
            "mosques_destroyed",
            &[
                "places_of_worship.mosques_destroyed",
                "places_of_worship.ext_mosques_destroyed",
            ],
        ),
        FieldSpec::count(
            "churches_destroyed",
            &[
                "places_of_worship.churches_destroyed",
                "places_of_worship.ext_churches_destroyed",
            ],
        ),
    ],
};

// ── Humanitarian data exchange ────────────────────────────────

pub const DISPLACEMENT: Schema = Schema {
    name: "displacement",
    date_fields: &["reference_period_start", "reference_period_end"],
    fields: &[
        FieldSpec::count("idps", &["population", "IDPs"]),
        FieldSpec::category("location", &["admin1_name", "location_name"]),
        FieldSpec::category("admin2", &["admin2_name"]),
        FieldSpec::category("assessment_type", &["assessment"]),
        FieldSpec::count("reporting_round", &["round"]),
    ],
};

pub const CONFLICT_EVENTS: Schema = Schema {
    name: "conflict-events",
    date_fields: &["reference_period_start", "event_date"],
    fields: &[
        FieldSpec::count("events", &["event_count"]),
        FieldSpec::count("fatalities", &["Fatalities"]),
        FieldSpec::category("event_type", &["type"]),
        FieldSpec::category("location", &["admin1_name", "location_name"]),
    ],
};

// ── Regional human-rights data service ───────────────────────

pub const DEMOLITIONS: Schema = Schema {
    name: "demolitions",
    date_fields: &["demolition_date", "Date"],
    fields: &[
        FieldSpec::count("structures", &["structures_demolished", "count"]),
        FieldSpec::count("people_affected", &["affected_people", "people_displaced"]),
        FieldSpec::category("location", &["locality", "area"]),
        FieldSpec::category("region", &["governorate"]),
        FieldSpec::category("reason", &["demolition_reason"]),
        FieldSpec::category("structure_type", &["type"]),
    ],
};

pub const HEALTHCARE: Schema = Schema {
    name: "healthcare",
    date_fields: &["incident_date", "Date"],
    fields: &[
        FieldSpec::count("killed", &["health_workers_killed", "Killed"]),
        FieldSpec::count("injured", &["health_workers_injured", "Injured"]),
        FieldSpec::count(
            "facilities_affected",
            &["facilities_attacked", "facilities"],
        ),
        FieldSpec::count(
            "ambulances_affected",
            &["ambulances_attacked", "ambulances"],
        ),
        FieldSpec::category("attack_type", &["type"]),
        FieldSpec::category("location", &["locality", "area"]),
    ],
};

pub const CHILD_PRISONERS: Schema = Schema {
    name: "child-prisoners",
    date_fields: &["month", "period"],
    fields: &[
        FieldSpec::count("detained", &["count", "child_prisoners"]),
        FieldSpec::category("age_group", &["ages"]),
    ],
};

// ── Economic indicators ──────────────────────────────────────

pub const INDICATORS: Schema = Schema {
    name: "indicators",
    date_fields: &["year"],
    fields: &[
        FieldSpec::category("indicator", &["indicator.id"]),
        FieldSpec::text("indicator_name", &["indicator.value"]),
        FieldSpec::number("value", &[]),
        FieldSpec::text("unit", &[]),
        FieldSpec::category("country", &["countryiso3code", "country.id"]),
    ],
};

/// Every schema, in publication order.
pub const ALL: &[Schema] = &[
    CASUALTIES,
    WEST_BANK,
    INFRASTRUCTURE,
    DISPLACEMENT,
    CONFLICT_EVENTS,
    DEMOLITIONS,
    HEALTHCARE,
    CHILD_PRISONERS,
    INDICATORS,
];

pub fn by_name(name: &str) -> Option<&'static Schema> {
    ALL.iter().find(|s| s.name == name)
}
