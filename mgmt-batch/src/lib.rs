/*
 * Licensed to the Apache Software Foundation (ASF) under one or more
 * contributor license agreements.  See the NOTICE file distributed with
 * this work for additional information regarding copyright ownership.
 * The ASF licenses this file to You under the Apache License, Version 2.0
 * (the "License"); you may not use this file except in compliance with
 * the License.  You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Batch engine: collects pre-parsed management commands into an editable
//! sequence, compiles them into one composite operation and translates
//! per-step failures back into the user's original command text.

pub mod batch;
pub mod compile;
pub mod manager;
pub mod runner;

pub use batch::Batch;
pub use batch::BatchedCommand;
pub use batch::ResponseHandler;
pub use compile::compile_composite;
pub use manager::BatchManager;
pub use runner::run;
pub use runner::run_file;
pub use runner::CommandCompiler;
