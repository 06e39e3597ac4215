//! Sample schema.
//!
//! Most harmonized sample fields live on related nodes (diagnoses,
//! sequencing files, pathology files). A related predicate holds when any
//! node of that kind satisfies it; listing reports the smallest normalized
//! value and counting reports every distinct one.

use ccdi_common::sentinel::{clean_int, clean_text};
use ccdi_common::{EntityType, FederationError, Result, ORGANIZATION};

use crate::aggregate::Emission;
use crate::catalog::Catalog;
use crate::cypher::{token_list, ParamBag, Predicate};
use crate::derive::{diagnosis_contains_condition, diagnosis_in_condition, resolve_diagnosis_node};
use crate::filters::FilterSet;
use crate::model::{
    depositions, present, primary_namespace, DiagnosisField, EntityId, Sample, SampleIdentifier,
    SampleMetadata, ValueField,
};
use crate::schema::{
    compile_shared, distinct, integer_predicate, integer_values, node_texts, reverse_values,
    stored_value_predicate, unharmonized, unharmonized_count_value, unsupported, CompiledFilters,
    EntitySchema, Relation, RowView, Target,
};

const DIAGNOSIS: Relation = Relation {
    key: "diagnosis",
    pattern: Some("(d:diagnosis)-[:of_diagnosis]->(sa)"),
    item: "collect(DISTINCT d) AS diagnoses",
    alias: "diagnoses",
    material: "[x IN diagnoses | properties(x)] AS diagnosis_props",
};

const SEQUENCING: Relation = Relation {
    key: "sequencing",
    pattern: Some("(sf:sequencing_file)-[:of_sequencing_file]->(sa)"),
    item: "collect(DISTINCT sf) AS seq_files",
    alias: "seq_files",
    material: "[x IN seq_files | properties(x)] AS seq_file_props",
};

const PATHOLOGY: Relation = Relation {
    key: "pathology",
    pattern: Some("(pf:pathology_file)-[:of_pathology_file]->(sa)"),
    item: "collect(DISTINCT pf) AS pathology_files",
    alias: "pathology_files",
    material: "[x IN pathology_files | properties(x)] AS pathology_file_props",
};

const PARTICIPANT: Relation = Relation {
    key: "participant",
    pattern: Some("(sa)-[:of_sample]->(p:participant)"),
    item: "collect(DISTINCT p.participant_id) AS participant_ids",
    alias: "participant_ids",
    material: "participant_ids",
};

/// A harmonized field read from a related node.
struct RelatedField {
    field: &'static str,
    relation: &'static Relation,
    property: &'static str,
}

impl RelatedField {
    /// Result column holding the related nodes' property maps.
    fn column(&self) -> &'static str {
        match self.relation.key {
            "diagnosis" => "diagnosis_props",
            "sequencing" => "seq_file_props",
            _ => "pathology_file_props",
        }
    }
}

const RELATED_FIELDS: &[RelatedField] = &[
    RelatedField { field: "disease_phase", relation: &DIAGNOSIS, property: "disease_phase" },
    RelatedField { field: "tumor_grade", relation: &DIAGNOSIS, property: "tumor_grade" },
    RelatedField {
        field: "tumor_classification",
        relation: &DIAGNOSIS,
        property: "tumor_classification",
    },
    RelatedField {
        field: "library_selection_method",
        relation: &SEQUENCING,
        property: "library_selection",
    },
    RelatedField { field: "library_strategy", relation: &SEQUENCING, property: "library_strategy" },
    RelatedField {
        field: "library_source_material",
        relation: &SEQUENCING,
        property: "library_source_material",
    },
    RelatedField {
        field: "specimen_molecular_analyte_type",
        relation: &SEQUENCING,
        property: "library_source_molecule",
    },
    RelatedField {
        field: "preservation_method",
        relation: &PATHOLOGY,
        property: "fixation_embedding_method",
    },
];

/// Harmonized fields stored on the sample node itself.
const SAMPLE_PROPERTIES: &[(&str, &str)] = &[
    ("tissue_type", "tissue_type"),
    ("tumor_tissue_morphology", "tumor_tissue_morphology"),
];

const ANATOMIC_SITE: &str = "anatomic_site";
const AGE_AT_COLLECTION: &str = "participant_age_at_collection";

fn related_field(field: &str) -> Option<&'static RelatedField> {
    RELATED_FIELDS.iter().find(|f| f.field == field)
}

fn sample_property(field: &str) -> Option<&'static str> {
    SAMPLE_PROPERTIES.iter().find(|(f, _)| *f == field).map(|(_, p)| *p)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SampleSchema;

impl SampleSchema {
    /// Every distinct normalized value of a related field.
    fn related_values(catalog: &Catalog, row: &RowView<'_>, rf: &RelatedField) -> Vec<String> {
        distinct(
            node_texts(row.list(rf.column()), rf.property)
                .iter()
                .filter_map(|v| catalog.mappings.map_value(rf.field, v))
                .collect(),
        )
    }

    fn anatomical_sites(catalog: &Catalog, row: &RowView<'_>) -> Vec<String> {
        distinct(
            row.tokens(ANATOMIC_SITE)
                .iter()
                .filter_map(|t| catalog.mappings.map_value("anatomical_sites", t))
                .collect(),
        )
    }

    fn diagnosis_ages(row: &RowView<'_>) -> Vec<i64> {
        let mut ages: Vec<i64> = row
            .list("diagnosis_props")
            .iter()
            .filter_map(|d| d.get("age_at_diagnosis"))
            .filter_map(clean_int)
            .collect();
        ages.sort_unstable();
        ages.dedup();
        ages
    }

    fn diagnoses(row: &RowView<'_>) -> Vec<String> {
        distinct(row.list("diagnosis_props").iter().filter_map(resolve_diagnosis_node).collect())
    }

    /// The smallest resolved diagnosis, with the node's comment when the
    /// diagnosis did not come from it.
    fn diagnosis_field(row: &RowView<'_>) -> Option<DiagnosisField> {
        row.list("diagnosis_props")
            .iter()
            .filter_map(|node| {
                let value = resolve_diagnosis_node(node)?;
                let raw = node.get("diagnosis").and_then(clean_text);
                let comment = if raw.as_deref() == Some(value.as_str()) {
                    node.get("diagnosis_comment").and_then(clean_text)
                } else {
                    None
                };
                Some(DiagnosisField { value, comment })
            })
            .min_by(|a, b| a.value.cmp(&b.value).then_with(|| a.comment.cmp(&b.comment)))
    }

    fn identifier(catalog: &Catalog, namespace: &str, name: &str) -> SampleIdentifier {
        let id = EntityId::new(namespace, name);
        let server = catalog.base_url.as_ref().map(|base| {
            format!(
                "{}/api/v1/sample/{ORGANIZATION}/{namespace}/{name}",
                base.trim_end_matches('/')
            )
        });
        SampleIdentifier {
            namespace: id.namespace,
            name: id.name,
            kind: if server.is_some() { "Linked" } else { "Unlinked" },
            server,
        }
    }

    fn compile_anatomical_sites(
        catalog: &Catalog,
        values: &[String],
        params: &mut ParamBag,
    ) -> Result<Predicate> {
        let m = reverse_values(catalog, "anatomical_sites", values)?;
        let tokens = token_list(&format!("sa.{ANATOMIC_SITE}"));
        let mut parts = Vec::new();
        if !m.values.is_empty() {
            let p = params.bind(m.values);
            parts.push(Predicate::AnyIn { list_expr: tokens.clone(), param: p });
        }
        if m.absent {
            let nulls = params.bind(m.null_values);
            parts.push(Predicate::expr(format!("size({tokens}) = 0")));
            parts.push(Predicate::expr(format!("ANY(t IN {tokens} WHERE t IN {nulls})")));
        }
        Ok(Predicate::or(parts))
    }
}

impl EntitySchema for SampleSchema {
    type Record = Sample;

    const ENTITY: EntityType = EntityType::Sample;
    const VAR: &'static str = "sa";
    const PRIMARY_PATTERN: &'static str = "(sa:sample)";
    const ID: &'static str = "sa.sample_id";
    const STUDY_PATTERNS: &'static [&'static str] = &[
        "(sa)-[:of_sample]->(:cell_line)-[:of_cell_line]->(st1:study)",
        "(sa)-[:of_sample]->(:participant)-[:of_participant]->(:consent_group)-[:of_consent_group]->(st2:study)",
    ];
    const STUDIES_ITEM: &'static str =
        "collect(DISTINCT st1.study_id) + collect(DISTINCT st2.study_id) AS studies";
    const RELATIONS: &'static [Relation] = &[DIAGNOSIS, SEQUENCING, PATHOLOGY, PARTICIPANT];

    fn check_parameters(&self, filters: &FilterSet) -> Result<()> {
        if filters.contains("anatomical_site") {
            return Err(FederationError::invalid_parameter(
                "anatomical_site",
                "use anatomical_sites to filter samples by site",
            ));
        }
        Ok(())
    }

    fn compile(
        &self,
        catalog: &Catalog,
        filters: &FilterSet,
        params: &mut ParamBag,
    ) -> Result<CompiledFilters> {
        let mut out = CompiledFilters::default();
        for (field, value) in filters.fields() {
            let values = value.values();
            if compile_shared::<Self>(field, &values, params, &mut out) {
                continue;
            }
            if let Some(rf) = related_field(field) {
                let m = reverse_values(catalog, field, &values)?;
                out.need(rf.relation.key);
                let target = Target::Related(rf.relation.alias);
                out.related.push(stored_value_predicate(params, target, rf.property, &m));
                continue;
            }
            if let Some(prop) = sample_property(field) {
                let m = reverse_values(catalog, field, &values)?;
                out.primary.push(stored_value_predicate(params, Target::Primary("sa"), prop, &m));
                continue;
            }
            match field {
                "anatomical_sites" => {
                    out.primary.push(Self::compile_anatomical_sites(catalog, &values, params)?);
                }
                "age_at_collection" => {
                    let ages = integer_values(field, &values)?;
                    out.primary.push(integer_predicate(params, Target::Primary("sa"), AGE_AT_COLLECTION, ages));
                }
                "age_at_diagnosis" => {
                    let ages = integer_values(field, &values)?;
                    out.need(DIAGNOSIS.key);
                    out.related.push(integer_predicate(
                        params,
                        Target::Related(DIAGNOSIS.alias),
                        "age_at_diagnosis",
                        ages,
                    ));
                }
                "diagnosis" => {
                    out.need(DIAGNOSIS.key);
                    let p = params.bind(values.clone());
                    out.related.push(Predicate::expr(format!(
                        "ANY(x IN diagnoses WHERE {})",
                        diagnosis_in_condition("x", &p)
                    )));
                }
                other => return Err(unsupported(Self::ENTITY, other)),
            }
        }

        if let Some(term) = filters.search() {
            out.need(DIAGNOSIS.key);
            let t = params.bind(term);
            out.related.push(Predicate::expr(format!(
                "ANY(x IN diagnoses WHERE {})",
                diagnosis_contains_condition("x", &t)
            )));
        }
        Ok(out)
    }

    fn count_filters(&self, field: &str, filters: &FilterSet) -> FilterSet {
        match field {
            "diagnosis" => filters.without(field).without_search(),
            _ => filters.clone(),
        }
    }

    fn field_relations(&self, field: &str) -> &'static [&'static str] {
        match related_field(field).map(|rf| rf.relation.key) {
            Some("diagnosis") => &["diagnosis"],
            Some("sequencing") => &["sequencing"],
            Some("pathology") => &["pathology"],
            _ => match field {
                "diagnosis" | "age_at_diagnosis" => &["diagnosis"],
                _ => &[],
            },
        }
    }

    fn to_record(
        &self,
        catalog: &Catalog,
        row: &RowView<'_>,
        namespace: Option<&str>,
    ) -> Result<Sample> {
        let name = row
            .id()
            .ok_or_else(|| FederationError::Database("sample row without an id".into()))?;
        let studies = row.studies();
        let namespace = namespace
            .map(str::to_string)
            .or_else(|| primary_namespace(&studies))
            .ok_or_else(|| FederationError::Database(format!("sample {name} has no study")))?;

        let first = |field: &str| -> Option<ValueField<String>> {
            let rf = related_field(field)?;
            present(Self::related_values(catalog, row, rf).into_iter().next())
        };
        let own = |field: &str| -> Option<ValueField<String>> {
            let prop = sample_property(field)?;
            present(catalog.mappings.map_json(field, row.prop(prop)))
        };
        let sites = Self::anatomical_sites(catalog, row);
        let subject = row
            .strings(PARTICIPANT.material)
            .into_iter()
            .min()
            .map(|participant| EntityId::new(&namespace, participant));

        let metadata = SampleMetadata {
            disease_phase: first("disease_phase"),
            anatomical_sites: (!sites.is_empty())
                .then(|| sites.into_iter().map(ValueField::new).collect()),
            library_selection_method: first("library_selection_method"),
            library_strategy: first("library_strategy"),
            library_source_material: first("library_source_material"),
            preservation_method: first("preservation_method"),
            tumor_grade: first("tumor_grade"),
            specimen_molecular_analyte_type: first("specimen_molecular_analyte_type"),
            tissue_type: own("tissue_type"),
            tumor_classification: first("tumor_classification"),
            age_at_diagnosis: present(Self::diagnosis_ages(row).into_iter().next()),
            age_at_collection: present(row.int(AGE_AT_COLLECTION)),
            tumor_tissue_morphology: own("tumor_tissue_morphology"),
            diagnosis: Self::diagnosis_field(row),
            identifiers: Some(vec![ValueField::new(Self::identifier(catalog, &namespace, &name))]),
            depositions: depositions(&studies),
            unharmonized: unharmonized(catalog, Self::ENTITY, row.get("props")),
        };
        Ok(Sample {
            id: EntityId::new(namespace, name),
            subject,
            metadata,
            gateways: Vec::new(),
        })
    }

    fn count_values(&self, catalog: &Catalog, field: &str, row: &RowView<'_>) -> Vec<String> {
        if let Some(values) = unharmonized_count_value(row, field) {
            return values;
        }
        if let Some(rf) = related_field(field) {
            return Self::related_values(catalog, row, rf);
        }
        if let Some(prop) = sample_property(field) {
            return catalog.mappings.map_json(field, row.prop(prop)).into_iter().collect();
        }
        match field {
            "anatomical_sites" => Self::anatomical_sites(catalog, row),
            "age_at_collection" => row.int(AGE_AT_COLLECTION).map(|a| a.to_string()).into_iter().collect(),
            "age_at_diagnosis" => Self::diagnosis_ages(row).iter().map(i64::to_string).collect(),
            "diagnosis" => Self::diagnoses(row),
            _ => Vec::new(),
        }
    }

    fn emission(&self, _field: &str) -> Emission {
        Emission::Observed
    }

    fn single_valued(&self, field: &str) -> bool {
        sample_property(field).is_some() || field == "age_at_collection"
    }
}
