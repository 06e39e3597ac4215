//! File schema over sequencing files.

use tracing::debug;

use ccdi_common::{EntityType, FederationError, Result};

use crate::aggregate::Emission;
use crate::catalog::Catalog;
use crate::cypher::{ParamBag, Predicate};
use crate::filters::FilterSet;
use crate::model::{
    depositions, present, primary_namespace, sorted_studies, Checksums, EntityId, File,
    FileMetadata,
};
use crate::schema::{
    compile_shared, integer_predicate, integer_values, unharmonized, unharmonized_count_value,
    unsupported, CompiledFilters, EntitySchema, Relation, RowView, Target,
};

const SAMPLES: Relation = Relation {
    key: "samples",
    pattern: None,
    item: "collect(DISTINCT sa.sample_id) AS sample_ids",
    alias: "sample_ids",
    material: "sample_ids",
};

#[derive(Debug, Clone, Copy, Default)]
pub struct FileSchema;

impl FileSchema {
    fn file_type(catalog: &Catalog, row: &RowView<'_>) -> Option<String> {
        let stored = row.text("file_type")?;
        catalog.file_types.normalize(&stored).map(str::to_string)
    }
}

impl EntitySchema for FileSchema {
    type Record = File;

    const ENTITY: EntityType = EntityType::File;
    const VAR: &'static str = "sf";
    const PRIMARY_PATTERN: &'static str = "(sf:sequencing_file)-[:of_sequencing_file]->(sa:sample)";
    const ID: &'static str = "sf.id";
    const STUDY_PATTERNS: &'static [&'static str] = &[
        "(sa)-[:of_sample]->(:participant)-[:of_participant]->(:consent_group)-[:of_consent_group]->(st1:study)",
        "(sa)-[:of_sample]->(:cell_line)-[:of_cell_line]->(st2:study)",
    ];
    const STUDIES_ITEM: &'static str =
        "collect(DISTINCT st1.study_id) + collect(DISTINCT st2.study_id) AS studies";
    const RELATIONS: &'static [Relation] = &[SAMPLES];

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
            match field {
                "type" => {
                    if let Some(unknown) = values.iter().find(|v| !catalog.file_types.contains(v)) {
                        debug!(file_type = %unknown, "file type outside the value set; nothing can match");
                        out.unsatisfiable = true;
                        continue;
                    }
                    let lowered: Vec<String> = values.iter().map(|v| v.to_lowercase()).collect();
                    let p = params.bind(lowered);
                    out.primary.push(Predicate::is_in("toLower(toString(sf.file_type))", p));
                }
                "size" => {
                    let sizes = integer_values(field, &values)?;
                    out.primary.push(integer_predicate(params, Target::Primary("sf"), "file_size", sizes));
                }
                "checksums" => {
                    let p = params.bind(values.clone());
                    out.primary.push(Predicate::is_in("sf.md5sum", p));
                }
                "description" => {
                    let p = params.bind(values.clone());
                    out.primary.push(Predicate::is_in("sf.file_description", p));
                }
                other => return Err(unsupported(Self::ENTITY, other)),
            }
        }
        if filters.search().is_some() {
            debug!("free-text search does not apply to files");
        }
        Ok(out)
    }

    fn field_relations(&self, _field: &str) -> &'static [&'static str] {
        &[]
    }

    fn to_record(
        &self,
        catalog: &Catalog,
        row: &RowView<'_>,
        namespace: Option<&str>,
    ) -> Result<File> {
        let name = row
            .id()
            .ok_or_else(|| FederationError::Database("file row without an id".into()))?;
        let studies = row.studies();
        let namespace = namespace
            .map(str::to_string)
            .or_else(|| primary_namespace(&studies))
            .ok_or_else(|| FederationError::Database(format!("file {name} has no study")))?;

        let mut sample_ids = row.strings(SAMPLES.material);
        sample_ids.sort();
        sample_ids.dedup();

        let metadata = FileMetadata {
            file_type: present(Self::file_type(catalog, row)),
            size: present(row.int("file_size")),
            checksums: present(row.text("md5sum").map(|md5| Checksums { md5 })),
            description: present(row.text("file_description")),
            depositions: depositions(&studies),
            unharmonized: unharmonized(catalog, Self::ENTITY, row.get("props")),
        };
        Ok(File {
            samples: sample_ids.into_iter().map(|s| EntityId::new(&namespace, s)).collect(),
            id: EntityId::new(namespace, name),
            metadata,
            gateways: Vec::new(),
        })
    }

    fn count_values(&self, catalog: &Catalog, field: &str, row: &RowView<'_>) -> Vec<String> {
        if let Some(values) = unharmonized_count_value(row, field) {
            return values;
        }
        match field {
            "type" => Self::file_type(catalog, row).into_iter().collect(),
            "depositions" => sorted_studies(&row.studies()),
            _ => Vec::new(),
        }
    }

    fn emission(&self, _field: &str) -> Emission {
        Emission::Observed
    }

    fn single_valued(&self, field: &str) -> bool {
        field == "type"
    }
}
