#[cfg(test)]
mod tests {
    use strata::{
        rvec, BufferType, DType, Element, Heap, IndexOperand, IndexingOperand, Interpreter,
        InvariantError, Region, RegionError, Value, ValueType, ViewType,
    };

    /// `for i in 0..n { out[i] = in[i][i] }`, with the loop body as a region taking `i`.
    fn diagonal_body(elem: DType) -> Region {
        let view = ValueType::View(ViewType::new(elem.into(), 2));
        let out = ValueType::View(ViewType::new(elem.into(), 1));
        let mut body = Region::new(rvec![view, out, ValueType::Index]);
        let (src, dst, i) = (body.argument(0), body.argument(1), body.argument(2));
        let all = body.range(0, usize::MAX, 1);
        let row = body.slice(
            src,
            &[IndexingOperand::Scalar(i.into()), IndexingOperand::Range(all)],
        );
        let x = body.load(row, &[i.into()]);
        body.store(x, dst, &[i.into()]);
        body.yield_(&[x]);
        body
    }

    #[test]
    fn loop_body_runs_per_iteration() -> anyhow::Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();
        let heap = Heap::default();
        let n = 4;
        let data = (0..n * n).map(|v| v as i32).collect::<Vec<_>>();
        let matrix = heap.from_slice(&data)?;
        let src = heap.view(
            &matrix,
            rvec![(0..n).into(), (0..n).into()],
            None,
        )?;
        let out = heap.alloc(BufferType::new(DType::I32.into(), None), Some(n), None)?;
        let dst = heap.view(&out, rvec![(0..n).into()], None)?;

        let body = diagonal_body(DType::I32);
        assert_eq!(
            body.verify()?.to_vec(),
            vec![ValueType::Element(DType::I32.into())]
        );

        let interpreter = Interpreter::new(&heap);
        for i in 0..n {
            let yielded = interpreter.run(
                &body,
                &[src.clone().into(), dst.clone().into(), Value::Index(i)],
            )?;
            assert_eq!(
                yielded.to_vec(),
                vec![Value::Element(Element::scalar((i * n + i) as i32))]
            );
        }
        assert_eq!(heap.to_vec::<i32>(&out)?, vec![0, 5, 10, 15]);
        Ok(())
    }

    #[test]
    fn allocation_lifecycle_in_region() -> anyhow::Result<()> {
        let heap = Heap::default();
        let mut region = Region::default();
        let buffer = region.alloc(
            BufferType::new(DType::F32.into(), Some(12)),
            None,
            Some(128),
        );
        let rows = region.range(0, 3, 1);
        let cols = region.range(0, 4, 1);
        let view = region.view(buffer, &[rows, cols], None);
        let t = region.transpose(view, &[1, 0]);
        let d0 = region.dim(t, 0);
        let d1 = region.dim(t, 1);
        let sub = region.subview(
            t,
            &[
                IndexOperand::Static(0),
                IndexOperand::Dynamic(d0),
                2.into(),
                0.into(),
                d1.into(),
                1.into(),
            ],
        );
        let sd0 = region.dim(sub, 0);
        let size = region.buffer_size(buffer);
        region.dealloc(buffer);
        region.yield_(&[d0, d1, sd0, size]);

        let results = Interpreter::new(&heap).run(&region, &[])?;
        assert_eq!(
            results.to_vec(),
            vec![
                Value::Index(4),
                Value::Index(3),
                Value::Index(2),
                Value::Index(12)
            ]
        );
        assert_eq!(heap.live_buffers(), 0);
        Ok(())
    }

    #[test]
    fn view_footprint_checked_at_evaluation() {
        let heap = Heap::default();
        let mut region = Region::new(rvec![ValueType::Index]);
        let n = region.argument(0);
        let buffer = region.alloc(BufferType::new(DType::F32.into(), Some(16)), None, None);
        let r = region.range(0, n, 1);
        let view = region.view(buffer, &[r, r], None);
        region.yield_(&[view]);

        let interpreter = Interpreter::new(&heap);
        assert!(interpreter.run(&region, &[Value::Index(4)]).is_ok());
        match interpreter.run(&region, &[Value::Index(5)]) {
            Err(RegionError::Evaluation { position: 2, .. }) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn declared_view_type_is_verified() {
        let mut region = Region::default();
        let buffer = region.alloc(BufferType::new(DType::F16.into(), Some(8)), None, None);
        let r = region.range(0, 8, 1);
        region.view(buffer, &[r], Some(ViewType::new(DType::F32.into(), 1)));
        region.yield_(&[]);
        assert!(matches!(
            region.verify(),
            Err(RegionError::Invalid {
                position: 2,
                source: InvariantError::ElementTypeMismatch { .. },
                ..
            })
        ));
    }
}
