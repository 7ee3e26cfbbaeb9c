use icu::locale::locale;
use icu_collator::options::CollatorOptions;
use olivine::common::{SortOrder, Value};
use olivine::doc;
use olivine::document::DOC_ID;
use olivine::errors::{ErrorKind, OlivineError, OlivineResult};
use olivine::filter::field;
use olivine::find_options::{order_by, FindOptions};
use olivine::keys::PrimaryKey;
use olivine::olivine::Olivine;
use olivine_int_test::test_util::{
    cleanup, create_test_context, insert_sample_specimens, run_test, sample_specimens, Analysis,
    Specimen,
};

#[ctor::ctor]
fn init() {
    colog::init();
}

/// Serials in result order, so sort tests see what a caller would see.
fn serials_with(db: &Olivine, options: &FindOptions) -> OlivineResult<Vec<i64>> {
    Ok(db
        .find_all::<Specimen>(options)?
        .records()?
        .iter()
        .map(|specimen| specimen.serial)
        .collect())
}

#[test]
fn test_insert_returns_applied_counts() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let specimens = sample_specimens();

            assert_eq!(db.insert(&specimens[0])?, 1);
            assert_eq!(db.insert_all(&specimens[1..])?, 2);
            assert_eq!(db.insert_all::<Specimen>(&[])?, 0);
            assert_eq!(db.count_all::<Specimen>(&FindOptions::new())?, 3);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_insert_assigns_sequence_ids_in_batch_order() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            db.insert_all(&[Analysis::new(1, "XRF", 12.0), Analysis::new(1, "ICP", 8.5)])?;

            let analyses = db
                .find_all::<Analysis>(&order_by("id", SortOrder::Ascending))?
                .records()?;
            assert_eq!(analyses.len(), 2);
            assert_eq!(analyses[0].id, 1);
            assert_eq!(analyses[0].method, "XRF");
            assert_eq!(analyses[1].id, 2);
            assert_eq!(analyses[1].method, "ICP");
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_insert_batch_is_all_or_nothing() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            insert_sample_specimens(&db)?;

            // A collision against a stored record rejects the whole batch.
            let error = db
                .insert_all(&[
                    Specimen::new(4, "garnet", "Ural Mountains", 8.0),
                    Specimen::new(2, "halite", "Searles Lake", 2.0),
                ])
                .unwrap_err();
            assert_eq!(error.kind(), &ErrorKind::KeyViolation);
            assert_eq!(db.count_all::<Specimen>(&FindOptions::new())?, 3);
            assert!(db.get_by_primary_key::<Specimen>(&PrimaryKey::I64(4))?.is_none());

            // So does a collision between two records of the same batch.
            let error = db
                .insert_all(&[
                    Specimen::new(5, "topaz", "Ouro Preto", 8.0),
                    Specimen::new(5, "beryl", "Coscuez", 7.5),
                ])
                .unwrap_err();
            assert_eq!(error.kind(), &ErrorKind::KeyViolation);
            assert_eq!(db.count_all::<Specimen>(&FindOptions::new())?, 3);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_sort_orders_results_both_ways() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            insert_sample_specimens(&db)?;

            assert_eq!(
                serials_with(&db, &order_by("mineral", SortOrder::Ascending))?,
                vec![3, 1, 2]
            );
            assert_eq!(
                serials_with(&db, &order_by("mineral", SortOrder::Descending))?,
                vec![2, 1, 3]
            );
            assert_eq!(
                serials_with(&db, &order_by("grade", SortOrder::Ascending))?,
                vec![3, 2, 1]
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_sort_chains_secondary_keys_and_stays_stable() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            insert_sample_specimens(&db)?;
            db.insert(&Specimen::new(4, "quartz", "Herkimer", 9.0))?;

            let options =
                order_by("mineral", SortOrder::Ascending).sort_by("grade", SortOrder::Descending);
            assert_eq!(serials_with(&db, &options)?, vec![3, 1, 4, 2]);

            // Records equal on every sort key keep their insertion order.
            db.insert(&Specimen::new(5, "quartz", "Herkimer", 9.0))?;
            assert_eq!(serials_with(&db, &options)?, vec![3, 1, 4, 5, 2]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_sort_places_missing_values_first() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            db.insert(&Specimen::new(1, "olivine", "Zabargad", 9.5))?;
            db.insert(&Specimen::new(2, "quartz", "Minas Gerais", 7.0).with_notes("alpha"))?;
            db.insert(&Specimen::new(3, "biotite", "Bancroft", 5.5).with_notes("beta"))?;

            // The sort sees the stored notes even though results strip them,
            // and records without the field come first in both directions.
            assert_eq!(
                serials_with(&db, &order_by("notes", SortOrder::Ascending))?,
                vec![1, 2, 3]
            );
            assert_eq!(
                serials_with(&db, &order_by("notes", SortOrder::Descending))?,
                vec![1, 3, 2]
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_pagination_applies_after_sort() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            insert_sample_specimens(&db)?;
            let by_grade = order_by("grade", SortOrder::Ascending);

            assert_eq!(serials_with(&db, &by_grade.clone().skip(1))?, vec![2, 1]);
            assert_eq!(serials_with(&db, &by_grade.clone().skip(1).limit(1))?, vec![2]);
            assert_eq!(serials_with(&db, &by_grade.clone().limit(10))?, vec![3, 2, 1]);
            assert!(serials_with(&db, &by_grade.clone().skip(3))?.is_empty());
            assert!(serials_with(&db, &by_grade.clone().skip(9000))?.is_empty());
            assert!(serials_with(&db, &by_grade.clone().limit(0))?.is_empty());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_count_honors_filter_and_caps() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            insert_sample_specimens(&db)?;

            assert_eq!(db.count_all::<Specimen>(&FindOptions::new())?, 3);
            assert_eq!(db.count_all::<Specimen>(&FindOptions::new().skip(1))?, 2);
            assert_eq!(db.count_all::<Specimen>(&FindOptions::new().limit(2))?, 2);
            assert_eq!(db.count_all::<Specimen>(&FindOptions::new().skip(2).limit(2))?, 1);

            let heavy = field("grade").gte(7.0f64);
            assert_eq!(db.count::<Specimen>(&heavy, &FindOptions::new())?, 2);
            assert_eq!(db.count::<Specimen>(&heavy, &FindOptions::new().limit(1))?, 1);
            assert_eq!(db.count::<Specimen>(&heavy, &FindOptions::new().skip(2))?, 0);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_upsert_inserts_then_replaces() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();

            assert_eq!(db.upsert(&Specimen::new(1, "olivine", "Zabargad", 9.5))?, 1);
            assert_eq!(db.count_all::<Specimen>(&FindOptions::new())?, 1);

            assert_eq!(db.upsert(&Specimen::new(1, "forsterite", "Zabargad", 9.7))?, 1);
            assert_eq!(db.count_all::<Specimen>(&FindOptions::new())?, 1);
            let stored = db.get_by_primary_key::<Specimen>(&PrimaryKey::I64(1))?.unwrap();
            assert_eq!(stored.mineral, "forsterite");
            assert_eq!(stored.grade, 9.7);

            // Upserts never consult the generator or the sequence.
            let error = db.upsert(&Analysis::new(1, "XRF", 12.0)).unwrap_err();
            assert_eq!(error.kind(), &ErrorKind::KeyViolation);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_upsert_batch_validates_keys_upfront() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();

            let error = db
                .upsert_all(&[
                    Specimen::new(1, "olivine", "Zabargad", 9.5),
                    Specimen::new(0, "quartz", "Minas Gerais", 7.0),
                ])
                .unwrap_err();
            assert_eq!(error.kind(), &ErrorKind::KeyViolation);
            assert_eq!(db.count_all::<Specimen>(&FindOptions::new())?, 0);

            assert_eq!(db.upsert_all(&sample_specimens())?, 3);
            assert_eq!(db.count_all::<Specimen>(&FindOptions::new())?, 3);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_modify_updates_misses_and_guards_the_key() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            insert_sample_specimens(&db)?;

            let changed = db.modify::<Specimen, _>(&PrimaryKey::I64(2), |mut specimen| {
                specimen.grade += 0.5;
                Ok(specimen)
            })?;
            assert_eq!(changed, 1);
            let stored = db.get_by_primary_key::<Specimen>(&PrimaryKey::I64(2))?.unwrap();
            assert_eq!(stored.grade, 7.5);

            assert_eq!(db.modify::<Specimen, _>(&PrimaryKey::I64(404), Ok)?, 0);

            let error = db
                .modify::<Specimen, _>(&PrimaryKey::I64(2), |mut specimen| {
                    specimen.serial = 20;
                    Ok(specimen)
                })
                .unwrap_err();
            assert_eq!(error.kind(), &ErrorKind::KeyViolation);
            assert!(db.get_by_primary_key::<Specimen>(&PrimaryKey::I64(20))?.is_none());
            assert!(db.get_by_primary_key::<Specimen>(&PrimaryKey::I64(2))?.is_some());

            // An error from the mutation aborts without touching the record.
            let error = db
                .modify::<Specimen, _>(&PrimaryKey::I64(2), |_| {
                    Err(OlivineError::new("stale reading", ErrorKind::InvalidOperation))
                })
                .unwrap_err();
            assert_eq!(error.kind(), &ErrorKind::InvalidOperation);
            let stored = db.get_by_primary_key::<Specimen>(&PrimaryKey::I64(2))?.unwrap();
            assert_eq!(stored.grade, 7.5);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_remove_variants() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let specimens = insert_sample_specimens(&db)?;

            assert_eq!(db.remove(&specimens[0])?, 1);
            assert_eq!(db.remove_by_key::<Specimen>(&PrimaryKey::I64(2))?, 1);
            assert_eq!(db.remove_by_key::<Specimen>(&PrimaryKey::I64(2))?, 0);
            assert_eq!(db.remove_all::<Specimen>(&field("mineral").eq("biotite"))?, 1);
            assert_eq!(db.count_all::<Specimen>(&FindOptions::new())?, 0);

            // Removing a record whose key is unset is refused outright.
            let error = db.remove(&Analysis::new(1, "XRF", 12.0)).unwrap_err();
            assert_eq!(error.kind(), &ErrorKind::KeyViolation);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_remove_batch_removes_by_identity() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let specimens = insert_sample_specimens(&db)?;

            // A key nobody holds counts zero, the rest are removed.
            let stray = Specimen::new(99, "fluorite", "Rogerley", 6.0);
            assert_eq!(db.remove_batch(&[specimens[0].clone(), stray])?, 1);
            assert_eq!(db.count_all::<Specimen>(&FindOptions::new())?, 2);

            // One unset key rejects the batch before anything is removed.
            let error = db
                .remove_batch(&[
                    specimens[1].clone(),
                    Specimen::new(0, "halite", "Searles Lake", 2.0),
                ])
                .unwrap_err();
            assert_eq!(error.kind(), &ErrorKind::KeyViolation);
            assert_eq!(db.count_all::<Specimen>(&FindOptions::new())?, 2);

            assert_eq!(db.remove_batch(&specimens[1..])?, 2);
            assert_eq!(db.count_all::<Specimen>(&FindOptions::new())?, 0);
            assert_eq!(db.remove_batch::<Specimen>(&[])?, 0);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_optional_fields_round_trip() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            db.insert(&Specimen::new(1, "olivine", "Zabargad", 9.5).with_notes("inclusion-rich"))?;

            let found = db.find_all::<Specimen>(&FindOptions::new())?.records()?;
            assert_eq!(found[0].notes, None);
            let kept = db
                .find_all_with_fields::<Specimen>(&FindOptions::new(), &["notes"])?
                .records()?;
            assert_eq!(kept[0].notes.as_deref(), Some("inclusion-rich"));

            let bare = db.get_by_primary_key::<Specimen>(&PrimaryKey::I64(1))?.unwrap();
            assert_eq!(bare.notes, None);
            let full = db
                .get_by_primary_key_with_fields::<Specimen>(&PrimaryKey::I64(1), &["notes"])?
                .unwrap();
            assert_eq!(full.notes.as_deref(), Some("inclusion-rich"));

            let injected = db.inject_optional_fields(bare.clone(), &["notes"])?;
            assert_eq!(injected.notes.as_deref(), Some("inclusion-rich"));
            let again = db.inject_optional_fields(injected, &["notes"])?;
            assert_eq!(again.notes.as_deref(), Some("inclusion-rich"));

            // Asking for a field that is not declared optional changes nothing.
            let ignored = db.inject_optional_fields(bare, &["locality"])?;
            assert_eq!(ignored.notes, None);
            assert_eq!(ignored.locality, "Zabargad");
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_document_surface_crud() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let ids = db.insert_documents(
                "assays",
                vec![
                    doc! { sample: "A", reading: 12i64 },
                    doc! { sample: "B", reading: 30i64 },
                ],
            )?;
            assert_eq!(ids.len(), 2);

            let fetched = db.get_by_document_id("assays", &ids[0])?.unwrap();
            assert_eq!(fetched.get("sample")?, Value::from("A"));
            assert_eq!(fetched.revision(), 1);

            let mut replacement = doc! { sample: "A", reading: 15i64 };
            replacement.put(DOC_ID, ids[0])?;
            let same_id = db.upsert_document("assays", replacement)?;
            assert_eq!(same_id, ids[0]);
            let updated = db.get_by_document_id("assays", &ids[0])?.unwrap();
            assert_eq!(updated.get("reading")?, Value::I64(15));
            assert_eq!(updated.revision(), 2);

            assert_eq!(
                db.count_documents("assays", &field("reading").gt(10i64), &FindOptions::new())?,
                2
            );
            assert_eq!(db.remove_document("assays", &ids[1])?, 1);
            assert_eq!(db.remove_document("assays", &ids[1])?, 0);
            assert_eq!(db.remove_documents("assays", &field("reading").lt(100i64))?, 1);
            assert_eq!(db.count_all_documents("assays", &FindOptions::new())?, 0);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_sort_with_collation_orders_accented_strings() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            db.insert_documents(
                "assays",
                vec![
                    doc! { sample: "Pineapple" },
                    doc! { sample: "Ôrange" },
                    doc! { sample: "Apple" },
                ],
            )?;

            let options = order_by("sample", SortOrder::Ascending)
                .with_collation(locale!("fr").into(), CollatorOptions::default());
            let names: Vec<String> = db
                .find_all_documents("assays", &options)?
                .documents()?
                .iter()
                .map(|document| {
                    document
                        .get("sample")
                        .ok()
                        .and_then(|value| value.as_str().map(str::to_string))
                        .unwrap_or_default()
                })
                .collect();
            assert_eq!(names, vec!["Apple", "Ôrange", "Pineapple"]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_cursor_replays_after_reset() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            insert_sample_specimens(&db)?;

            let mut cursor = db.find_all::<Specimen>(&order_by("serial", SortOrder::Ascending))?;
            assert_eq!(cursor.size(), 3);

            cursor.reset();
            let first = cursor.first().unwrap()?;
            assert_eq!(first.serial, 1);

            cursor.reset();
            assert_eq!(cursor.records()?.len(), 3);
            Ok(())
        },
        cleanup,
    )
}
