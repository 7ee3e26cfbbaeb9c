use olivine::common::Value;
use olivine::doc;
use olivine::errors::ErrorKind;
use olivine::filter::{and, field};
use olivine::join::Lookup;
use olivine_int_test::test_util::{
    cleanup, create_test_context, insert_sample_specimens, run_test, Analysis, Specimen,
};

#[ctor::ctor]
fn init() {
    colog::init();
}

fn analysis_lookup() -> Lookup {
    Lookup::new("serial", "specimen_serial", "analyses")
}

#[test]
fn test_join_attaches_children_to_typed_parents() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let specimens = insert_sample_specimens(&db)?;
            db.insert_all(&[
                Analysis::new(1, "XRF", 12.0),
                Analysis::new(1, "ICP", 8.5),
                Analysis::new(1, "SEM", 3.2),
                Analysis::new(2, "XRF", 40.0),
            ])?;

            let joined =
                db.join_all_children::<Specimen, Analysis>(&specimens, &analysis_lookup())?;
            assert_eq!(joined.len(), 3);

            // Parents come back in input order with their children attached.
            assert_eq!(joined[0].get("serial")?, Value::I64(1));
            let attached = joined[0].get("analyses")?;
            let attached = attached.as_array().unwrap();
            assert_eq!(attached.len(), 3);
            let first = attached[0].as_document().unwrap();
            assert_eq!(first.get("method")?, Value::from("XRF"));
            assert_eq!(first.get("specimen_serial")?, Value::I64(1));

            assert_eq!(
                joined[1].get("analyses")?.as_array().unwrap().len(),
                1
            );

            // The third specimen has no analyses and no target field, not
            // an empty array.
            assert!(!joined[2].has_field("analyses"));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_join_respects_child_filter() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let specimens = insert_sample_specimens(&db)?;
            db.insert_all(&[
                Analysis::new(1, "XRF", 12.0),
                Analysis::new(1, "ICP", 8.5),
                Analysis::new(2, "ICP", 40.0),
            ])?;

            let joined = db.join_children::<Specimen, Analysis>(
                &specimens,
                &field("method").eq("XRF"),
                &analysis_lookup(),
            )?;

            let attached = joined[0].get("analyses")?;
            assert_eq!(attached.as_array().unwrap().len(), 1);

            // Specimen 2 only carries ICP analyses, so the filter leaves it
            // without the target field.
            assert!(!joined[1].has_field("analyses"));
            assert!(!joined[2].has_field("analyses"));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_unsatisfiable_child_filter_leaves_parents_untouched() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let specimens = insert_sample_specimens(&db)?;
            db.insert(&Analysis::new(1, "XRF", 12.0))?;

            // No analysis can satisfy both arms at once.
            let joined = db.join_children::<Specimen, Analysis>(
                &specimens,
                &and(vec![
                    field("method").eq("XRF"),
                    field("method").eq("neutron activation"),
                ]),
                &analysis_lookup(),
            )?;

            assert_eq!(joined.len(), 3);
            for (parent, specimen) in joined.iter().zip(&specimens) {
                assert!(!parent.has_field("analyses"));
                assert_eq!(parent.get("serial")?, Value::I64(specimen.serial));
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_join_on_document_collections() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            db.insert_all(&[
                Analysis::new(1, "XRF", 12.0),
                Analysis::new(1, "ICP", 8.5),
                Analysis::new(2, "XRF", 40.0),
            ])?;

            let parents = vec![doc! { probe: 1i64 }, doc! { probe: 3i64 }];
            let joined = db.join_all_document_children(
                parents,
                "analyses",
                &Lookup::new("probe", "specimen_serial", "readings"),
            )?;

            assert_eq!(joined[0].get("readings")?.as_array().unwrap().len(), 2);
            assert!(!joined[1].has_field("readings"));

            let parents = vec![doc! { probe: 1i64 }];
            let joined = db.join_document_children(
                parents,
                "analyses",
                &field("method").eq("ICP"),
                &Lookup::new("probe", "specimen_serial", "readings"),
            )?;
            assert_eq!(joined[0].get("readings")?.as_array().unwrap().len(), 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_join_skips_children_without_the_foreign_field() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            db.insert_documents(
                "assays",
                vec![
                    doc! { probe_serial: 1i64, reading: 12i64 },
                    doc! { reading: 99i64 },
                ],
            )?;

            let parents = vec![doc! { serial: 1i64 }, doc! { name: "keyless" }];
            let joined = db.join_all_document_children(
                parents,
                "assays",
                &Lookup::new("serial", "probe_serial", "readings"),
            )?;

            let attached = joined[0].get("readings")?;
            assert_eq!(attached.as_array().unwrap().len(), 1);

            // A parent without the local field never matches either.
            assert!(!joined[1].has_field("readings"));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_join_validates_lookup_and_store_state() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let specimens = insert_sample_specimens(&db)?;

            let error = db
                .join_all_children::<Specimen, Analysis>(
                    &specimens,
                    &Lookup::new("", "specimen_serial", "analyses"),
                )
                .unwrap_err();
            assert_eq!(error.kind(), &ErrorKind::InvalidOperation);

            db.close()?;
            let error = db
                .join_all_children::<Specimen, Analysis>(&specimens, &analysis_lookup())
                .unwrap_err();
            assert_eq!(error.kind(), &ErrorKind::Closed);
            Ok(())
        },
        |_| Ok(()),
    )
}
