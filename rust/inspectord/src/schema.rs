//! Column catalog of the tabular mirror.
//!
//! The serializer and the parser both walk this catalog; neither keeps its own
//! list of column positions. Header labels are the wire contract with the
//! remote sheet, so changing one means bumping [`SCHEMA_VERSION`] and, when an
//! old label must still be readable, adding it to [`SUPERSEDED_HEADERS`].

use std::sync::OnceLock;

pub const SCHEMA_VERSION: u32 = 3;

/// Logical teacher/report attributes that own exactly one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    // identity / biographical
    Id,
    Name,
    BirthDate,
    BirthPlace,
    Degree,
    DegreeDate,
    RecruitmentDate,
    Rank,
    RankDate,
    Echelon,
    EchelonDate,
    LastMark,
    LastInspectionDate,
    Status,
    TenureDate,
    Note,
    // report / session
    Variant,
    InspectorName,
    Region,
    District,
    School,
    InspectionDate,
    Subject,
    Topic,
    Duration,
    Level,
    Group,
    AttendanceTotal,
    AttendancePresent,
    TargetLevels,
    GeneralAssessment,
    FinalMark,
    MarkInWords,
}

const FIELD_HEADERS: &[(Field, &str)] = &[
    (Field::Id, "Teacher ID"),
    (Field::Name, "Name"),
    (Field::BirthDate, "Birth date"),
    (Field::BirthPlace, "Birth place"),
    (Field::Degree, "Degree"),
    (Field::DegreeDate, "Degree date"),
    (Field::RecruitmentDate, "Recruitment date"),
    (Field::Rank, "Rank"),
    (Field::RankDate, "Rank date"),
    (Field::Echelon, "Echelon"),
    (Field::EchelonDate, "Echelon date"),
    (Field::LastMark, "Last mark"),
    (Field::LastInspectionDate, "Last inspection date"),
    (Field::Status, "Status"),
    (Field::TenureDate, "Tenure exam date"),
    (Field::Note, "Private note"),
    (Field::Variant, "Report form"),
    (Field::InspectorName, "Inspector"),
    (Field::Region, "Region"),
    (Field::District, "District"),
    (Field::School, "School"),
    (Field::InspectionDate, "Inspection date"),
    (Field::Subject, "Subject"),
    (Field::Topic, "Topic"),
    (Field::Duration, "Duration"),
    (Field::Level, "Class level"),
    (Field::Group, "Group"),
    (Field::AttendanceTotal, "Enrolled"),
    (Field::AttendancePresent, "Present"),
    (Field::TargetLevels, "Target levels"),
    (Field::GeneralAssessment, "General assessment"),
    (Field::FinalMark, "Final mark"),
    (Field::MarkInWords, "Mark in words"),
];

/// Labels written by earlier schema versions that still carry data for a field.
pub const SUPERSEDED_HEADERS: &[(Field, &str)] =
    &[(Field::GeneralAssessment, "Overall assessment")];

/// Legacy-form fields: (key in `ReportData::legacy`, header label).
pub const LEGACY_FIELDS: &[(&str, &str)] = &[
    ("lessonPlan", "Legacy: lesson plan"),
    ("teachingAids", "Legacy: teaching aids"),
    ("boardUse", "Legacy: board use"),
    ("classManagement", "Legacy: class management"),
    ("participation", "Legacy: pupil participation"),
    ("assessmentPractice", "Legacy: assessment practice"),
    ("notebooks", "Legacy: notebooks follow-up"),
    ("timeUse", "Legacy: time use"),
    ("language", "Legacy: language quality"),
    ("documents", "Legacy: pedagogical documents"),
    ("previousAdvice", "Legacy: follow-up of previous advice"),
    ("advice", "Legacy: advice"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservationTemplate {
    pub id: &'static str,
    pub category: &'static str,
    pub criteria: &'static str,
    pub indicators: &'static [&'static str],
}

pub const OBSERVATION_TEMPLATES: &[ObservationTemplate] = &[
    ObservationTemplate {
        id: "plan-objectives",
        category: "Planning",
        criteria: "Learning objectives are stated and match the curriculum",
        indicators: &[
            "objectives written in the lesson plan",
            "objectives are observable",
        ],
    },
    ObservationTemplate {
        id: "plan-sequence",
        category: "Planning",
        criteria: "The lesson follows coherent stages",
        indicators: &["launch, construction, consolidation", "timing per stage"],
    },
    ObservationTemplate {
        id: "exec-launch",
        category: "Execution",
        criteria: "The launch situation engages pupils",
        indicators: &["problem situation", "links to prior learning"],
    },
    ObservationTemplate {
        id: "exec-activities",
        category: "Execution",
        criteria: "Activities are varied and suited to the level",
        indicators: &["individual and group work", "differentiation"],
    },
    ObservationTemplate {
        id: "exec-aids",
        category: "Execution",
        criteria: "Teaching aids are used purposefully",
        indicators: &["aids prepared in advance", "board organised"],
    },
    ObservationTemplate {
        id: "exec-language",
        category: "Execution",
        criteria: "The language of instruction is correct and clear",
        indicators: &["clear instructions", "correct terminology"],
    },
    ObservationTemplate {
        id: "climate-management",
        category: "Classroom climate",
        criteria: "The class is managed calmly and time is used well",
        indicators: &["routines in place", "no idle time"],
    },
    ObservationTemplate {
        id: "climate-participation",
        category: "Classroom climate",
        criteria: "All pupils take part",
        indicators: &["questions spread across the class", "pupil talk encouraged"],
    },
    ObservationTemplate {
        id: "assess-formative",
        category: "Assessment",
        criteria: "Understanding is checked during the lesson",
        indicators: &["targeted questions", "errors exploited"],
    },
    ObservationTemplate {
        id: "assess-notebooks",
        category: "Assessment",
        criteria: "Pupils' notebooks are followed and corrected",
        indicators: &["regular correction", "written feedback"],
    },
];

pub fn observation_template(id: &str) -> Option<&'static ObservationTemplate> {
    OBSERVATION_TEMPLATES.iter().find(|t| t.id == id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Field(Field),
    Legacy(&'static str),
    Score(&'static str),
    Note(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub column: Column,
    pub header: String,
    /// Position in the canonical header row; used when the header is not found.
    pub default_index: usize,
}

#[derive(Debug)]
pub struct SchemaCatalog {
    version: u32,
    columns: Vec<ColumnDescriptor>,
}

impl SchemaCatalog {
    fn build() -> Self {
        let mut headers: Vec<(Column, String)> = Vec::new();
        for (field, header) in FIELD_HEADERS {
            headers.push((Column::Field(*field), header.to_string()));
        }
        for (key, header) in LEGACY_FIELDS {
            headers.push((Column::Legacy(*key), header.to_string()));
        }
        for t in OBSERVATION_TEMPLATES {
            headers.push((Column::Score(t.id), score_header(t.id)));
            headers.push((Column::Note(t.id), note_header(t.id)));
        }

        let columns = headers
            .into_iter()
            .enumerate()
            .map(|(default_index, (column, header))| ColumnDescriptor {
                column,
                header,
                default_index,
            })
            .collect();

        Self {
            version: SCHEMA_VERSION,
            columns,
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn header_row(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.header.clone()).collect()
    }

    pub fn descriptor(&self, column: Column) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.column == column)
    }

    pub fn header(&self, column: Column) -> Option<&str> {
        self.descriptor(column).map(|c| c.header.as_str())
    }
}

pub fn score_header(template_id: &str) -> String {
    format!("score_{}", template_id)
}

pub fn note_header(template_id: &str) -> String {
    format!("note_{}", template_id)
}

/// The catalog shared by every serialize/parse call.
pub fn catalog() -> &'static SchemaCatalog {
    static CATALOG: OnceLock<SchemaCatalog> = OnceLock::new();
    CATALOG.get_or_init(SchemaCatalog::build)
}
