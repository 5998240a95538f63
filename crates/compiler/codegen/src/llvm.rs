//! SSA → LLVM IR lowering for the v1 Drift ABI (textual emitter).
//!
//! The emitter is deliberately small and produces LLVM text suitable for
//! feeding to `lli`/`clang` in tests. It avoids allocas and lowers block
//! parameters directly to phi nodes.

use drift_common::{Literal, TypeData, TypeId, TypeTable};
use drift_compiler_mir::{BasicBlock, BinOp, Instruction, SsaFunc, Terminator};
use drift_compiler_semantic::FnInfo;
use rustc_hash::FxHashMap;
use thiserror::Error;

/// ABI type names.
pub const DRIFT_ERROR_TYPE: &str = "%DriftError";
pub const FNRESULT_INT_ERROR: &str = "%FnResult_Int_Error";

#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("LLVM codegen v1: {0}")]
    Unsupported(String),
    #[error("LLVM codegen v1: missing return type for '{0}'")]
    MissingReturnType(String),
}

fn unsupported(msg: impl Into<String>) -> CodegenError {
    CodegenError::Unsupported(msg.into())
}

/// Textual LLVM module builder with seeded ABI type declarations.
#[derive(Debug)]
pub struct LlvmModuleBuilder {
    type_decls: Vec<String>,
    funcs: Vec<String>,
}

impl Default for LlvmModuleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LlvmModuleBuilder {
    pub fn new() -> Self {
        Self {
            type_decls: vec![
                format!("{DRIFT_ERROR_TYPE} = type {{ i64, ptr, ptr, ptr }}"),
                format!("{FNRESULT_INT_ERROR} = type {{ i1, i64, {DRIFT_ERROR_TYPE} }}"),
            ],
            funcs: Vec::new(),
        }
    }

    pub fn emit_func(&mut self, text: String) {
        self.funcs.push(text);
    }

    pub fn render(&self) -> String {
        let mut lines: Vec<&str> = Vec::new();
        for decl in &self.type_decls {
            lines.push(decl);
        }
        lines.push("");
        for func in &self.funcs {
            lines.push(func);
        }
        lines.push("");
        lines.join("\n")
    }
}

/// Lower a single SSA function to LLVM IR text using `FnInfo` for return
/// typing and callee shapes.
pub fn lower_ssa_func_to_llvm(
    ssa: &SsaFunc,
    fn_info: &FnInfo,
    fn_infos: &FxHashMap<String, FnInfo>,
    table: &TypeTable,
) -> Result<String, CodegenError> {
    let builder = FuncBuilder {
        ssa,
        fn_info,
        fn_infos,
        table,
        tmp_counter: 0,
        lines: Vec::new(),
        value_map: FxHashMap::default(),
    };
    builder.lower()
}

struct FuncBuilder<'a> {
    ssa: &'a SsaFunc,
    fn_info: &'a FnInfo,
    fn_infos: &'a FxHashMap<String, FnInfo>,
    table: &'a TypeTable,
    tmp_counter: u32,
    lines: Vec<String>,
    value_map: FxHashMap<String, String>,
}

impl<'a> FuncBuilder<'a> {
    fn lower(mut self) -> Result<String, CodegenError> {
        self.assert_acyclic()?;
        self.emit_header()?;
        let block_names: Vec<String> = self.ssa.func.blocks.keys().cloned().collect();
        for name in &block_names {
            self.emit_block(name)?;
        }
        self.lines.push("}".to_string());
        Ok(self.lines.join("\n"))
    }

    fn emit_header(&mut self) -> Result<(), CodegenError> {
        if !self.ssa.func.params.is_empty() {
            return Err(unsupported("parameters not supported yet"));
        }
        let ret_ty = self.return_llvm_type()?;
        self.lines
            .push(format!("define {ret_ty} @{}() {{", self.ssa.func.name));
        Ok(())
    }

    fn emit_block(&mut self, block_name: &str) -> Result<(), CodegenError> {
        let block = &self.ssa.func.blocks[block_name];
        self.lines.push(format!("{block_name}:"));
        self.emit_phis(block)?;
        for instr in &block.instructions {
            self.lower_instr(instr)?;
        }
        match &block.terminator {
            Some(term) => self.lower_term(term),
            None => Err(unsupported(format!("block '{block_name}' lacks a terminator"))),
        }
    }

    /// Block parameters become phi nodes fed by predecessor edge arguments.
    fn emit_phis(&mut self, block: &BasicBlock) -> Result<(), CodegenError> {
        if block.params.is_empty() {
            return Ok(());
        }
        let incoming = self.ssa.func.incoming_edges(&block.name);
        for (index, param) in block.params.iter().enumerate() {
            let ty = self.llvm_type(param.ty)?;
            let mut arms = Vec::new();
            for (pred, edge, is_error_edge) in &incoming {
                if *is_error_edge {
                    return Err(unsupported(
                        "fallible call edges are not lowered in v1",
                    ));
                }
                let Some(arg) = edge.args.get(index) else {
                    return Err(unsupported(format!(
                        "edge into '{}' missing argument {index}",
                        block.name
                    )));
                };
                arms.push(format!("[ {}, %{pred} ]", self.map_value(arg)));
            }
            let dest = self.map_value(&param.name);
            self.lines
                .push(format!("  {dest} = phi {ty} {}", arms.join(", ")));
        }
        Ok(())
    }

    fn lower_instr(&mut self, instr: &Instruction) -> Result<(), CodegenError> {
        match instr {
            Instruction::Const { dest, value, .. } => {
                let dest = self.map_value(dest);
                match value {
                    Literal::Int(v) => self.lines.push(format!("  {dest} = add i64 0, {v}")),
                    Literal::Bool(v) => {
                        let v = if *v { 1 } else { 0 };
                        self.lines.push(format!("  {dest} = add i1 0, {v}"));
                    }
                    Literal::Str(_) => {
                        return Err(unsupported("string constants"));
                    }
                }
                Ok(())
            }
            Instruction::Assign { dest, source } => {
                // Pure alias; both names resolve to the same LLVM value.
                let mapped = self.map_value(source);
                self.value_map.insert(dest.clone(), mapped);
                Ok(())
            }
            Instruction::BinaryOp {
                dest,
                op,
                left,
                right,
            } => {
                let dest = self.map_value(dest);
                let left = self.map_value(left);
                let right = self.map_value(right);
                let line = match op {
                    BinOp::Add => format!("  {dest} = add i64 {left}, {right}"),
                    BinOp::Sub => format!("  {dest} = sub i64 {left}, {right}"),
                    BinOp::Mul => format!("  {dest} = mul i64 {left}, {right}"),
                    BinOp::Div => format!("  {dest} = sdiv i64 {left}, {right}"),
                    BinOp::Eq => format!("  {dest} = icmp eq i64 {left}, {right}"),
                    BinOp::Neq => format!("  {dest} = icmp ne i64 {left}, {right}"),
                    BinOp::Less => format!("  {dest} = icmp slt i64 {left}, {right}"),
                    BinOp::Greater => format!("  {dest} = icmp sgt i64 {left}, {right}"),
                    BinOp::LessEqual => format!("  {dest} = icmp sle i64 {left}, {right}"),
                    BinOp::GreaterEqual => format!("  {dest} = icmp sge i64 {left}, {right}"),
                    BinOp::And => format!("  {dest} = and i1 {left}, {right}"),
                    BinOp::Or => format!("  {dest} = or i1 {left}, {right}"),
                };
                self.lines.push(line);
                Ok(())
            }
            Instruction::Call {
                dest,
                callee,
                args,
                normal,
                error,
            } => {
                if normal.is_some() || error.is_some() {
                    return Err(unsupported("fallible call edges are not lowered in v1"));
                }
                self.lower_call(dest, callee, args)
            }
            Instruction::FieldGet { dest, base, field } => {
                let dest = self.map_value(dest);
                let base = self.map_value(base);
                let index = match field.as_str() {
                    "is_err" => 0,
                    "ok" => 1,
                    "err" => 2,
                    other => {
                        return Err(unsupported(format!(
                            "field access '{other}' outside the result carrier"
                        )))
                    }
                };
                self.lines.push(format!(
                    "  {dest} = extractvalue {FNRESULT_INT_ERROR} {base}, {index}"
                ));
                Ok(())
            }
            Instruction::ConstructResultOk { dest, value } => {
                let dest = self.map_value(dest);
                let value = self.map_value(value);
                let tmp0 = self.fresh("ok0");
                let tmp1 = self.fresh("ok1");
                self.lines.push(format!(
                    "  {tmp0} = insertvalue {FNRESULT_INT_ERROR} undef, i1 0, 0"
                ));
                self.lines.push(format!(
                    "  {tmp1} = insertvalue {FNRESULT_INT_ERROR} {tmp0}, i64 {value}, 1"
                ));
                self.lines.push(format!(
                    "  {dest} = insertvalue {FNRESULT_INT_ERROR} {tmp1}, {DRIFT_ERROR_TYPE} zeroinitializer, 2"
                ));
                Ok(())
            }
            Instruction::ConstructResultErr { dest, error } => {
                let dest = self.map_value(dest);
                let error = self.map_value(error);
                let tmp0 = self.fresh("err0");
                let tmp1 = self.fresh("err1");
                self.lines.push(format!(
                    "  {tmp0} = insertvalue {FNRESULT_INT_ERROR} undef, i1 1, 0"
                ));
                self.lines.push(format!(
                    "  {tmp1} = insertvalue {FNRESULT_INT_ERROR} {tmp0}, i64 0, 1"
                ));
                self.lines.push(format!(
                    "  {dest} = insertvalue {FNRESULT_INT_ERROR} {tmp1}, {DRIFT_ERROR_TYPE} {error}, 2"
                ));
                Ok(())
            }
            Instruction::ConstructError { dest, code, .. } => {
                let dest = self.map_value(dest);
                let code = self.map_value(code);
                let tmp0 = self.fresh("errc0");
                let tmp1 = self.fresh("errc1");
                let tmp2 = self.fresh("errc2");
                self.lines.push(format!(
                    "  {tmp0} = insertvalue {DRIFT_ERROR_TYPE} undef, i64 {code}, 0"
                ));
                self.lines.push(format!(
                    "  {tmp1} = insertvalue {DRIFT_ERROR_TYPE} {tmp0}, ptr null, 1"
                ));
                self.lines.push(format!(
                    "  {tmp2} = insertvalue {DRIFT_ERROR_TYPE} {tmp1}, ptr null, 2"
                ));
                self.lines.push(format!(
                    "  {dest} = insertvalue {DRIFT_ERROR_TYPE} {tmp2}, ptr null, 3"
                ));
                Ok(())
            }
            other => Err(unsupported(format!(
                "unsupported instruction {other:?}"
            ))),
        }
    }

    fn lower_call(
        &mut self,
        dest: &str,
        callee: &str,
        args: &[String],
    ) -> Result<(), CodegenError> {
        let args = args
            .iter()
            .map(|a| format!("i64 {}", self.map_value(a)))
            .collect::<Vec<_>>()
            .join(", ");
        let callee_can_throw = self
            .fn_infos
            .get(callee)
            .is_some_and(|info| info.declared_can_throw);
        let dest = self.map_value(dest);
        if callee_can_throw {
            self.lines.push(format!(
                "  {dest} = call {FNRESULT_INT_ERROR} @{callee}({args})"
            ));
        } else {
            self.lines
                .push(format!("  {dest} = call i64 @{callee}({args})"));
        }
        Ok(())
    }

    fn lower_term(&mut self, term: &Terminator) -> Result<(), CodegenError> {
        match term {
            Terminator::Br { edge } => {
                self.lines.push(format!("  br label %{}", edge.target));
                Ok(())
            }
            Terminator::CondBr {
                cond,
                then_edge,
                else_edge,
            } => {
                let cond = self.map_value(cond);
                self.lines.push(format!(
                    "  br i1 {cond}, label %{}, label %{}",
                    then_edge.target, else_edge.target
                ));
                Ok(())
            }
            Terminator::Return { value } => {
                let Some(value) = value else {
                    return Err(unsupported("bare return"));
                };
                let value = self.map_value(value);
                if self.fn_info.declared_can_throw {
                    self.lines
                        .push(format!("  ret {FNRESULT_INT_ERROR} {value}"));
                } else {
                    self.lines.push(format!("  ret i64 {value}"));
                }
                Ok(())
            }
            Terminator::Raise { .. } => Err(unsupported("raise outside a result carrier")),
        }
    }

    fn return_llvm_type(&self) -> Result<String, CodegenError> {
        if self.fn_info.declared_can_throw {
            return Ok(FNRESULT_INT_ERROR.to_string());
        }
        let ty = self
            .fn_info
            .return_type_id
            .ok_or_else(|| CodegenError::MissingReturnType(self.ssa.func.name.clone()))?;
        self.llvm_type(ty)
    }

    fn llvm_type(&self, ty: TypeId) -> Result<String, CodegenError> {
        match self.table.get(ty) {
            TypeData::Scalar(name) if name == "Int" => Ok("i64".to_string()),
            TypeData::Scalar(name) if name == "Bool" => Ok("i1".to_string()),
            TypeData::Error => Ok(DRIFT_ERROR_TYPE.to_string()),
            TypeData::FnResult { .. } => Ok(FNRESULT_INT_ERROR.to_string()),
            // Merge parameters of untyped pipelines default to Int.
            TypeData::Unknown(_) => Ok("i64".to_string()),
            other => Err(unsupported(format!("non-scalar type {other:?}"))),
        }
    }

    fn fresh(&mut self, hint: &str) -> String {
        self.tmp_counter += 1;
        format!("%{hint}{}", self.tmp_counter)
    }

    fn map_value(&mut self, name: &str) -> String {
        if let Some(mapped) = self.value_map.get(name) {
            return mapped.clone();
        }
        let mapped = format!("%{name}");
        self.value_map.insert(name.to_string(), mapped.clone());
        mapped
    }

    /// Loops are rejected in the SSA stage; this is a cheap final guard
    /// against self-branches reaching the emitter.
    fn assert_acyclic(&self) -> Result<(), CodegenError> {
        for (name, block) in &self.ssa.func.blocks {
            if let Some(term) = &block.terminator {
                if term.target_blocks().iter().any(|t| t == name) {
                    return Err(unsupported("loops/backedges unsupported"));
                }
            }
        }
        Ok(())
    }
}
